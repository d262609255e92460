// ============================================================
// Layer 5 — Training Callbacks
// ============================================================
// Two hooks the training driver calls:
//
//   LossLogger → every `interval` steps prints the training loss
//                and records loss / lr scalars
//
//   Evaluator  → every `eval_step` steps runs the model over the
//                dev set, scores it, writes the prediction file
//                and records the eval scalars
//
// The evaluator runs on the inner (non-autodiff) backend with
// dropout disabled; the driver hands it `model.valid()`.

use anyhow::Result;
use burn::{
    data::dataloader::{DataLoader, DataLoaderBuilder},
    prelude::*,
};
use std::{path::PathBuf, sync::Arc};

use crate::data::{
    batcher::{NerBatch, NerBatcher},
    dataset::{NerDataset, NerSample},
};
use crate::domain::{sentence::TaggedSentence, tag_vocab::TagVocab};
use crate::infra::metrics::MetricsLogger;
use crate::ml::model::{predicted_ids, NerModel};
use crate::ml::ner_metrics::{write_predictions, EvalReport};

// ─── Loss Logger ──────────────────────────────────────────────────────────────
pub struct LossLogger<'a> {
    interval: usize,
    metrics:  Option<&'a MetricsLogger>,
}

impl<'a> LossLogger<'a> {
    pub fn new(interval: usize, metrics: Option<&'a MetricsLogger>) -> Self {
        Self { interval: interval.max(1), metrics }
    }

    pub fn on_step(&self, step: usize, loss: f64, lr: f64) -> Result<()> {
        if step % self.interval != 0 {
            return Ok(());
        }
        println!("Loss: {:.3}", loss);
        tracing::debug!("step {} loss={:.5} lr={:.3e}", step, loss, lr);
        if let Some(m) = self.metrics {
            m.log_scalars(step, &[("loss", loss), ("lr", lr)])?;
        }
        Ok(())
    }
}

// ─── Evaluator ────────────────────────────────────────────────────────────────
pub struct Evaluator<'a> {
    dataset:    NerDataset,
    sentences:  Vec<TaggedSentence>,
    vocab:      &'a TagVocab,
    batch_size: usize,
    eval_step:  usize,
    output:     PathBuf,
    metrics:    Option<&'a MetricsLogger>,
}

impl<'a> Evaluator<'a> {
    pub fn new(
        samples:    Vec<NerSample>,
        sentences:  Vec<TaggedSentence>,
        vocab:      &'a TagVocab,
        batch_size: usize,
        eval_step:  usize,
        output:     impl Into<PathBuf>,
        metrics:    Option<&'a MetricsLogger>,
    ) -> Self {
        Self {
            dataset: NerDataset::new(samples),
            sentences,
            vocab,
            batch_size: batch_size.max(1),
            eval_step:  eval_step.max(1),
            output:     output.into(),
            metrics,
        }
    }

    pub fn is_due(&self, step: usize) -> bool {
        step % self.eval_step == 0
    }

    /// Run the model over every dev sample and score the result
    pub fn evaluate<B: Backend>(
        &self,
        step:   usize,
        model:  &NerModel<B>,
        device: &B::Device,
    ) -> Result<EvalReport> {
        let loader: Arc<dyn DataLoader<B, NerBatch<B>>> = DataLoaderBuilder::new(NerBatcher::new())
            .batch_size(self.batch_size)
            .num_workers(1)
            .set_device(device.clone())
            .build(self.dataset.clone());

        // Per sentence, per word: predicted tag id
        let mut predicted: Vec<Vec<Option<u32>>> = self
            .sentences
            .iter()
            .map(|s| vec![None; s.len()])
            .collect();
        let mut loss_sum = 0.0f64;
        let mut batches  = 0usize;

        for batch in loader.iter() {
            let seq_len = batch.input_ids.dims()[1];

            let (loss, logits) = model.forward_loss(
                batch.input_ids,
                batch.input_type_ids,
                batch.input_mask,
                batch.labels,
                batch.label_mask,
            );
            loss_sum += loss.into_scalar().elem::<f64>();
            batches  += 1;

            let ids = predicted_ids(logits);
            for (row, sample) in batch.samples.iter().enumerate() {
                let words = &mut predicted[sample.sentence];
                for (k, pos) in sample.label_positions().enumerate() {
                    if let Some(slot) = words.get_mut(sample.first_word + k) {
                        *slot = Some(ids[row * seq_len + pos] as u32);
                    }
                }
            }
        }

        let predicted_tags = self.decode(&predicted);
        let loss = if batches > 0 { loss_sum / batches as f64 } else { f64::NAN };

        let report = EvalReport::score(&self.sentences, &predicted_tags, loss);
        report.log();
        write_predictions(&self.output, &self.sentences, &predicted_tags)?;

        if let Some(m) = self.metrics {
            m.log_scalars(
                step,
                &[
                    ("eval_loss", report.loss),
                    ("accuracy", report.accuracy),
                    ("precision", report.overall.precision()),
                    ("recall", report.overall.recall()),
                    ("f1", report.overall.f1()),
                ],
            )?;
        }
        Ok(report)
    }

    /// Words no sample covered (none, unless features were built
    /// from different sentences) fall back to the outside tag.
    fn decode(&self, predicted: &[Vec<Option<u32>>]) -> Vec<Vec<String>> {
        predicted
            .iter()
            .map(|words| {
                words
                    .iter()
                    .map(|id| id.map_or("O", |id| self.vocab.tag(id)).to_string())
                    .collect()
            })
            .collect()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::features::FeatureBuilder;
    use crate::infra::tokenizer_store::word_level_tokenizer;
    use crate::ml::bert::tests::tiny_config;
    use burn::backend::NdArray;
    use std::path::Path;

    type TestBackend = NdArray;

    #[test]
    fn test_evaluate_covers_every_word_and_writes_output() {
        let device = Default::default();
        let tok    = word_level_tokenizer(&["EU", "rejects", "German", "call"]);
        let sentences = vec![
            TaggedSentence::new(
                vec!["EU".into(), "rejects".into(), "German".into(), "call".into()],
                vec!["B-ORG".into(), "O".into(), "B-MISC".into(), "O".into()],
            ),
            TaggedSentence::new(vec!["call".into()], vec!["O".into()]),
        ];
        let vocab = TagVocab::from_sentences(&sentences);

        // Window of 3 pieces forces the first sentence into two samples
        let samples = FeatureBuilder::new(&tok, 5)
            .unwrap()
            .build(&sentences, &vocab, Path::new("dev.txt"))
            .unwrap();
        assert_eq!(samples.len(), 3);

        let dir    = tempfile::tempdir().unwrap();
        let output = dir.path().join("output.txt");
        let eval   = Evaluator::new(samples, sentences, &vocab, 2, 10, &output, None);
        let model  = NerModel::<TestBackend>::new(&tiny_config(), vocab.len(), 0.0, &device);

        let report = eval.evaluate(10, &model, &device).unwrap();
        assert!(report.loss.is_finite());
        assert!((0.0..=1.0).contains(&report.accuracy));

        let text  = std::fs::read_to_string(&output).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4 + 1 + 1 + 1);
        assert!(lines[0].starts_with("EU B-ORG "));
        assert!(lines[5].starts_with("call O "));
    }

    #[test]
    fn test_loss_logger_fires_on_first_step() {
        use crate::infra::metrics::SCALARS_FILE;

        let dir     = tempfile::tempdir().unwrap();
        let metrics = MetricsLogger::new(dir.path()).unwrap();
        let logger  = LossLogger::new(25, Some(&metrics));

        for step in [0, 1, 24, 25, 26] {
            logger.on_step(step, 0.5, 1e-3).unwrap();
        }

        let text = std::fs::read_to_string(dir.path().join(SCALARS_FILE)).unwrap();
        let loss_steps: Vec<&str> = text
            .lines()
            .filter(|l| l.contains(",loss,"))
            .map(|l| l.split(',').next().unwrap())
            .collect();
        assert_eq!(loss_steps, vec!["0", "25"]);
    }

    #[test]
    fn test_eval_schedule() {
        let vocab = TagVocab::from_sentences(&[]);
        let eval  = Evaluator::new(Vec::new(), Vec::new(), &vocab, 4, 3, "unused", None);
        assert!(!eval.is_due(1));
        assert!(eval.is_due(3));
        assert!(eval.is_due(6));
    }
}
