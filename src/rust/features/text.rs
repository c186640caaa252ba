use std::collections::HashMap;

use log::debug;
use ndarray::Array1;

use crate::config::{EncoderConfig, NormKind};
use crate::error::{Result, SpendcatError};
use crate::utils::normalize_vector;

/// Character n-gram encoder with inverse-document-frequency weights.
///
/// Fitting keeps the `max_features` most frequent 2- and 3-grams of the
/// training descriptions. Columns are ordered by token, so the column of a
/// given n-gram never depends on hash iteration order.
///
/// ```
/// use spendcat::{CharNgramEncoder, EncoderConfig};
///
/// let corpus = ["UBER TRIP", "UBER EATS", "NETFLIX"];
/// let encoder = CharNgramEncoder::fit(&corpus, &EncoderConfig::default()).unwrap();
/// let features = encoder.transform("uber trip");
/// assert_eq!(features.len(), encoder.len());
/// assert_eq!(encoder.transform("").sum(), 0.0);
/// ```
#[derive(Debug, Clone)]
pub struct CharNgramEncoder {
    vocabulary: Vec<String>,
    index: HashMap<String, usize>,
    idf: Vec<f32>,
    min_ngram: usize,
    max_ngram: usize,
    norm: NormKind,
}

impl CharNgramEncoder {
    pub fn fit<S: AsRef<str>>(corpus: &[S], config: &EncoderConfig) -> Result<Self> {
        config.validate()?;
        if corpus.is_empty() {
            return Err(SpendcatError::EmptyTrainingSet);
        }

        // token -> (term frequency, document frequency)
        let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
        for doc in corpus {
            let mut grams = char_ngrams(&preprocess(doc.as_ref()), config.min_ngram, config.max_ngram);
            for gram in &grams {
                counts.entry(gram.clone()).or_insert((0, 0)).0 += 1;
            }
            grams.sort_unstable();
            grams.dedup();
            for gram in grams {
                if let Some(entry) = counts.get_mut(&gram) {
                    entry.1 += 1;
                }
            }
        }

        let mut ranked: Vec<(String, usize, usize)> = counts
            .into_iter()
            .map(|(token, (tf, df))| (token, tf, df))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(config.max_features);
        ranked.sort_by(|a, b| a.0.cmp(&b.0));

        let n_docs = corpus.len() as f64;
        let idf = ranked
            .iter()
            .map(|(_, _, df)| (((1.0 + n_docs) / (1.0 + *df as f64)).ln() + 1.0) as f32)
            .collect();
        let vocabulary: Vec<String> = ranked.into_iter().map(|(token, _, _)| token).collect();

        debug!(
            "Fitted n-gram vocabulary: {} tokens from {} descriptions",
            vocabulary.len(),
            corpus.len()
        );
        Self::from_parts(vocabulary, idf, config.min_ngram, config.max_ngram, config.norm)
    }

    /// Rebuilds an encoder from its persisted parts, checking they agree.
    pub fn from_parts(
        vocabulary: Vec<String>,
        idf: Vec<f32>,
        min_ngram: usize,
        max_ngram: usize,
        norm: NormKind,
    ) -> Result<Self> {
        if vocabulary.len() != idf.len() {
            return Err(SpendcatError::DimensionMismatch {
                expected: vocabulary.len(),
                actual: idf.len(),
            });
        }
        if min_ngram == 0 || min_ngram > max_ngram {
            return Err(SpendcatError::Config(format!(
                "invalid n-gram range ({}, {})",
                min_ngram, max_ngram
            )));
        }
        let mut index = HashMap::with_capacity(vocabulary.len());
        for (column, token) in vocabulary.iter().enumerate() {
            if index.insert(token.clone(), column).is_some() {
                return Err(SpendcatError::Config(format!("duplicate vocabulary token '{}'", token)));
            }
        }
        Ok(Self {
            vocabulary,
            index,
            idf,
            min_ngram,
            max_ngram,
            norm,
        })
    }

    /// Encodes one description. Unknown n-grams contribute nothing and an
    /// empty description yields the zero vector.
    pub fn transform(&self, description: &str) -> Array1<f32> {
        let mut counts = Array1::<f32>::zeros(self.vocabulary.len());
        for gram in char_ngrams(&preprocess(description), self.min_ngram, self.max_ngram) {
            if let Some(&column) = self.index.get(&gram) {
                counts[column] += 1.0;
            }
        }
        for (value, weight) in counts.iter_mut().zip(&self.idf) {
            *value *= weight;
        }
        match self.norm {
            NormKind::L2 => normalize_vector(&counts),
            NormKind::None => counts,
        }
    }

    /// Kept n-grams in column order
    pub fn vocabulary(&self) -> &[String] {
        &self.vocabulary
    }

    pub fn idf(&self) -> &[f32] {
        &self.idf
    }

    pub fn ngram_range(&self) -> (usize, usize) {
        (self.min_ngram, self.max_ngram)
    }

    pub fn norm(&self) -> NormKind {
        self.norm
    }

    /// Number of text columns
    pub fn len(&self) -> usize {
        self.vocabulary.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vocabulary.is_empty()
    }

    /// Width of the fused feature vector: text columns plus the amount
    pub fn feature_width(&self) -> usize {
        self.vocabulary.len() + 1
    }
}

/// Lowercases and collapses every whitespace run into a single space.
fn preprocess(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn char_ngrams(text: &str, min_n: usize, max_n: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut grams = Vec::new();
    for n in min_n..=max_n {
        if chars.len() < n {
            break;
        }
        grams.extend(chars.windows(n).map(|w| w.iter().collect::<String>()));
    }
    grams
}
