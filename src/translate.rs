//! Genetic code and conceptual translation.
//!
//! Used by the resolver to check that a candidate CDS really encodes the
//! input protein: the nucleotide sequence is translated under the standard
//! genetic code and compared against the target amino acids.

use std::collections::HashMap;

/// Standard genetic code, single-letter amino-acid output.
#[derive(Debug, Clone)]
pub struct CodonTable {
    /// Codon to amino acid mapping (stop codons map to `*`)
    codon_to_aa: HashMap<[u8; 3], u8>,
    /// Start codons translated as Met when alternative starts are allowed
    alternative_starts: Vec<[u8; 3]>,
}

/// The standard code, codon → single-letter amino acid, `*` for stop.
const STANDARD_CODE: &[(&str, u8)] = &[
    // Phenylalanine (F)
    ("TTT", b'F'),
    ("TTC", b'F'),
    // Leucine (L)
    ("TTA", b'L'),
    ("TTG", b'L'),
    ("CTT", b'L'),
    ("CTC", b'L'),
    ("CTA", b'L'),
    ("CTG", b'L'),
    // Isoleucine (I)
    ("ATT", b'I'),
    ("ATC", b'I'),
    ("ATA", b'I'),
    // Methionine (M) - also the canonical start
    ("ATG", b'M'),
    // Valine (V)
    ("GTT", b'V'),
    ("GTC", b'V'),
    ("GTA", b'V'),
    ("GTG", b'V'),
    // Serine (S)
    ("TCT", b'S'),
    ("TCC", b'S'),
    ("TCA", b'S'),
    ("TCG", b'S'),
    ("AGT", b'S'),
    ("AGC", b'S'),
    // Proline (P)
    ("CCT", b'P'),
    ("CCC", b'P'),
    ("CCA", b'P'),
    ("CCG", b'P'),
    // Threonine (T)
    ("ACT", b'T'),
    ("ACC", b'T'),
    ("ACA", b'T'),
    ("ACG", b'T'),
    // Alanine (A)
    ("GCT", b'A'),
    ("GCC", b'A'),
    ("GCA", b'A'),
    ("GCG", b'A'),
    // Tyrosine (Y)
    ("TAT", b'Y'),
    ("TAC", b'Y'),
    // Stop codons
    ("TAA", b'*'), // Ochre
    ("TAG", b'*'), // Amber
    ("TGA", b'*'), // Opal
    // Histidine (H)
    ("CAT", b'H'),
    ("CAC", b'H'),
    // Glutamine (Q)
    ("CAA", b'Q'),
    ("CAG", b'Q'),
    // Asparagine (N)
    ("AAT", b'N'),
    ("AAC", b'N'),
    // Lysine (K)
    ("AAA", b'K'),
    ("AAG", b'K'),
    // Aspartic acid (D)
    ("GAT", b'D'),
    ("GAC", b'D'),
    // Glutamic acid (E)
    ("GAA", b'E'),
    ("GAG", b'E'),
    // Cysteine (C)
    ("TGT", b'C'),
    ("TGC", b'C'),
    // Tryptophan (W)
    ("TGG", b'W'),
    // Arginine (R)
    ("CGT", b'R'),
    ("CGC", b'R'),
    ("CGA", b'R'),
    ("CGG", b'R'),
    ("AGA", b'R'),
    ("AGG", b'R'),
    // Glycine (G)
    ("GGT", b'G'),
    ("GGC", b'G'),
    ("GGA", b'G'),
    ("GGG", b'G'),
];

/// Why a nucleotide sequence could not be translated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranslateError {
    /// Sequence length is not a multiple of three
    NotTriplet { len: usize },
    /// Codon contains a base outside ACGTU
    InvalidCodon { position: usize, codon: String },
    /// Stop codon before the final position
    InternalStop { position: usize },
}

impl std::fmt::Display for TranslateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TranslateError::NotTriplet { len } => {
                write!(f, "sequence length {} is not a multiple of 3", len)
            }
            TranslateError::InvalidCodon { position, codon } => {
                write!(f, "invalid codon {} at nt position {}", codon, position)
            }
            TranslateError::InternalStop { position } => {
                write!(f, "internal stop codon at nt position {}", position)
            }
        }
    }
}

impl CodonTable {
    /// Create the standard genetic code.
    pub fn standard() -> Self {
        let mut codon_to_aa = HashMap::with_capacity(64);
        for (codon_str, aa) in STANDARD_CODE {
            let bytes = codon_str.as_bytes();
            codon_to_aa.insert([bytes[0], bytes[1], bytes[2]], *aa);
        }

        // Common bacterial alternative initiators (NCBI table 11)
        let alternative_starts = vec![*b"GTG", *b"TTG", *b"CTG"];

        Self {
            codon_to_aa,
            alternative_starts,
        }
    }

    /// Translate a coding sequence to its amino-acid sequence.
    ///
    /// A single trailing stop codon is dropped; an internal stop is an
    /// error. With `allow_alternative_start` the first codon may be one of
    /// the bacterial alternative initiators and is translated as Met.
    /// `U` is accepted as `T`; case is ignored.
    pub fn translate(
        &self,
        nt: &str,
        allow_alternative_start: bool,
    ) -> Result<String, TranslateError> {
        if nt.len() % 3 != 0 {
            return Err(TranslateError::NotTriplet { len: nt.len() });
        }

        let normalized: Vec<u8> = nt
            .bytes()
            .map(|b| match b.to_ascii_uppercase() {
                b'U' => b'T',
                other => other,
            })
            .collect();

        let n_codons = normalized.len() / 3;
        let mut protein = String::with_capacity(n_codons);

        for (i, codon) in normalized.chunks_exact(3).enumerate() {
            let codon: [u8; 3] = [codon[0], codon[1], codon[2]];

            if i == 0 && allow_alternative_start && self.alternative_starts.contains(&codon) {
                protein.push('M');
                continue;
            }

            match self.codon_to_aa.get(&codon) {
                Some(b'*') => {
                    if i + 1 == n_codons {
                        break; // trailing stop
                    }
                    return Err(TranslateError::InternalStop { position: i * 3 });
                }
                Some(aa) => protein.push(*aa as char),
                None => {
                    return Err(TranslateError::InvalidCodon {
                        position: i * 3,
                        codon: String::from_utf8_lossy(&codon).into_owned(),
                    })
                }
            }
        }

        Ok(protein)
    }
}

impl Default for CodonTable {
    fn default() -> Self {
        Self::standard()
    }
}
