//! Serialized form of the matched artifact set.
//!
//! Each artifact is a JSON document with a header naming its kind, the
//! format version and the id of the training run that produced it. The
//! encoder and classifier also record the feature width they were fit on,
//! so a mixed set is rejected at load time instead of failing inside
//! prediction.

use serde::{Deserialize, Serialize};

use crate::booster::{BoosterParams, GradientBoostedClassifier, Tree};
use crate::config::NormKind;
use crate::error::{Result, SpendcatError};
use crate::features::CharNgramEncoder;
use crate::labels::LabelCodec;

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Encoder,
    Classifier,
    LabelCodec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ArtifactHeader {
    format_version: u32,
    kind: ArtifactKind,
    run_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct EncoderPayload {
    header: ArtifactHeader,
    feature_width: usize,
    min_ngram: usize,
    max_ngram: usize,
    norm: NormKind,
    vocabulary: Vec<String>,
    idf: Vec<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ClassifierPayload {
    header: ArtifactHeader,
    num_features: usize,
    num_classes: usize,
    params: BoosterParams,
    base_scores: Vec<f32>,
    trees: Vec<Tree>,
}

#[derive(Debug, Serialize, Deserialize)]
struct LabelCodecPayload {
    header: ArtifactHeader,
    classes: Vec<String>,
}

/// The three opaque blobs handed to and received from persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactBlobs {
    pub run_id: String,
    pub encoder: Vec<u8>,
    pub classifier: Vec<u8>,
    pub label_codec: Vec<u8>,
}

/// Encoder, classifier and label codec produced by one training run.
///
/// The constructor checks that the three agree on feature width and class
/// count, so holding an `ArtifactSet` means holding a usable matched set.
#[derive(Debug, Clone)]
pub struct ArtifactSet {
    run_id: String,
    encoder: CharNgramEncoder,
    classifier: GradientBoostedClassifier,
    codec: LabelCodec,
}

impl ArtifactSet {
    pub fn new(
        run_id: impl Into<String>,
        encoder: CharNgramEncoder,
        classifier: GradientBoostedClassifier,
        codec: LabelCodec,
    ) -> Result<Self> {
        check_matched(&encoder, &classifier, &codec)?;
        Ok(Self {
            run_id: run_id.into(),
            encoder,
            classifier,
            codec,
        })
    }

    pub fn to_blobs(&self) -> Result<ArtifactBlobs> {
        let header = |kind| ArtifactHeader {
            format_version: FORMAT_VERSION,
            kind,
            run_id: self.run_id.clone(),
        };
        let (min_ngram, max_ngram) = self.encoder.ngram_range();
        let encoder = EncoderPayload {
            header: header(ArtifactKind::Encoder),
            feature_width: self.encoder.feature_width(),
            min_ngram,
            max_ngram,
            norm: self.encoder.norm(),
            vocabulary: self.encoder.vocabulary().to_vec(),
            idf: self.encoder.idf().to_vec(),
        };
        let classifier = ClassifierPayload {
            header: header(ArtifactKind::Classifier),
            num_features: self.classifier.num_features(),
            num_classes: self.classifier.num_classes(),
            params: self.classifier.params().clone(),
            base_scores: self.classifier.base_scores().to_vec(),
            trees: self.classifier.trees().to_vec(),
        };
        let codec = LabelCodecPayload {
            header: header(ArtifactKind::LabelCodec),
            classes: self.codec.class_names().to_vec(),
        };
        Ok(ArtifactBlobs {
            run_id: self.run_id.clone(),
            encoder: serde_json::to_vec(&encoder)?,
            classifier: serde_json::to_vec(&classifier)?,
            label_codec: serde_json::to_vec(&codec)?,
        })
    }

    /// Decodes and cross-checks three blobs.
    ///
    /// # Errors
    /// * `ArtifactMismatch` when the blobs are of the wrong kind or version,
    ///   disagree on feature width or class count, or come from different runs
    /// * `Serialization` when a blob is not a valid artifact document
    pub fn from_blobs(encoder: &[u8], classifier: &[u8], label_codec: &[u8]) -> Result<Self> {
        let encoder: EncoderPayload = serde_json::from_slice(encoder)?;
        let classifier: ClassifierPayload = serde_json::from_slice(classifier)?;
        let codec: LabelCodecPayload = serde_json::from_slice(label_codec)?;

        check_header(&encoder.header, ArtifactKind::Encoder)?;
        check_header(&classifier.header, ArtifactKind::Classifier)?;
        check_header(&codec.header, ArtifactKind::LabelCodec)?;

        let run_id = encoder.header.run_id.clone();
        let text_encoder = CharNgramEncoder::from_parts(
            encoder.vocabulary,
            encoder.idf,
            encoder.min_ngram,
            encoder.max_ngram,
            encoder.norm,
        )?;
        if text_encoder.feature_width() != encoder.feature_width {
            return Err(SpendcatError::ArtifactMismatch(format!(
                "encoder declares width {} but its vocabulary gives {}",
                encoder.feature_width,
                text_encoder.feature_width()
            )));
        }
        let model = GradientBoostedClassifier::from_parts(
            classifier.trees,
            classifier.base_scores,
            classifier.num_features,
            classifier.num_classes,
            classifier.params,
        )?;
        let label_codec = LabelCodec::from_classes(codec.classes)?;

        check_matched(&text_encoder, &model, &label_codec)?;
        for (kind, other) in [
            (ArtifactKind::Classifier, &classifier.header.run_id),
            (ArtifactKind::LabelCodec, &codec.header.run_id),
        ] {
            if *other != run_id {
                return Err(SpendcatError::ArtifactMismatch(format!(
                    "{:?} comes from run {} but the encoder from run {}",
                    kind, other, run_id
                )));
            }
        }

        Ok(Self {
            run_id,
            encoder: text_encoder,
            classifier: model,
            codec: label_codec,
        })
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn encoder(&self) -> &CharNgramEncoder {
        &self.encoder
    }

    pub fn classifier(&self) -> &GradientBoostedClassifier {
        &self.classifier
    }

    pub fn codec(&self) -> &LabelCodec {
        &self.codec
    }
}

fn check_header(header: &ArtifactHeader, expected: ArtifactKind) -> Result<()> {
    if header.kind != expected {
        return Err(SpendcatError::ArtifactMismatch(format!(
            "expected a {:?} artifact, found {:?}",
            expected, header.kind
        )));
    }
    if header.format_version != FORMAT_VERSION {
        return Err(SpendcatError::ArtifactMismatch(format!(
            "{:?} artifact has format version {}, expected {}",
            expected, header.format_version, FORMAT_VERSION
        )));
    }
    Ok(())
}

fn check_matched(encoder: &CharNgramEncoder, classifier: &GradientBoostedClassifier, codec: &LabelCodec) -> Result<()> {
    if encoder.feature_width() != classifier.num_features() {
        return Err(SpendcatError::ArtifactMismatch(format!(
            "encoder produces {} features but the classifier was fit on {}",
            encoder.feature_width(),
            classifier.num_features()
        )));
    }
    if codec.len() != classifier.num_classes() {
        return Err(SpendcatError::ArtifactMismatch(format!(
            "label codec has {} classes but the classifier predicts {}",
            codec.len(),
            classifier.num_classes()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrainingConfig;
    use crate::dataset::mock_transactions;
    use crate::pipeline::TrainingPipeline;

    fn trained(max_features: usize) -> ArtifactSet {
        let mut config = TrainingConfig::small();
        config.encoder.max_features = max_features;
        config.booster.n_trees = 5;
        TrainingPipeline::new(config).unwrap().fit(&mock_transactions()).unwrap().artifacts
    }

    #[test]
    fn test_blob_round_trip() {
        let set = trained(30);
        let blobs = set.to_blobs().unwrap();
        let restored = ArtifactSet::from_blobs(&blobs.encoder, &blobs.classifier, &blobs.label_codec).unwrap();
        assert_eq!(restored.run_id(), set.run_id());
        assert_eq!(restored.encoder().vocabulary(), set.encoder().vocabulary());
        assert_eq!(restored.classifier(), set.classifier());
        assert_eq!(restored.codec(), set.codec());
    }

    #[test]
    fn test_mixed_widths_rejected() {
        let small = trained(20).to_blobs().unwrap();
        let large = trained(40).to_blobs().unwrap();
        let err = ArtifactSet::from_blobs(&small.encoder, &large.classifier, &large.label_codec).unwrap_err();
        assert!(matches!(err, SpendcatError::ArtifactMismatch(_)), "got {:?}", err);
    }

    #[test]
    fn test_swapped_blobs_rejected() {
        let blobs = trained(20).to_blobs().unwrap();
        let err = ArtifactSet::from_blobs(&blobs.label_codec, &blobs.classifier, &blobs.encoder).unwrap_err();
        // a codec document lacks encoder fields, so it fails to parse or is the wrong kind
        assert!(matches!(
            err,
            SpendcatError::ArtifactMismatch(_) | SpendcatError::Serialization(_)
        ));
    }

    #[test]
    fn test_run_id_mismatch_rejected() {
        let blobs = trained(20).to_blobs().unwrap();
        let mut codec: serde_json::Value = serde_json::from_slice(&blobs.label_codec).unwrap();
        codec["header"]["run_id"] = serde_json::Value::from("another-run");
        let codec = serde_json::to_vec(&codec).unwrap();
        let err = ArtifactSet::from_blobs(&blobs.encoder, &blobs.classifier, &codec).unwrap_err();
        assert!(matches!(err, SpendcatError::ArtifactMismatch(msg) if msg.contains("another-run")));
    }

    #[test]
    fn test_unknown_version_rejected() {
        let blobs = trained(20).to_blobs().unwrap();
        let mut encoder: serde_json::Value = serde_json::from_slice(&blobs.encoder).unwrap();
        encoder["header"]["format_version"] = serde_json::Value::from(99);
        let encoder = serde_json::to_vec(&encoder).unwrap();
        assert!(matches!(
            ArtifactSet::from_blobs(&encoder, &blobs.classifier, &blobs.label_codec),
            Err(SpendcatError::ArtifactMismatch(_))
        ));
    }
}
