//! Tensorboard recorder of self-play training metrics.
use log::warn;
use pursuit_core::record::{Record, RecordValue, Recorder};
use std::path::Path;
use tensorboard_rs::summary_writer::SummaryWriter;

/// Writes records to TFRecord.
///
/// Every record must hold a scalar under the step key, `iteration` by
/// default, which becomes the step of all other values of the record.
pub struct TensorboardRecorder {
    writer: SummaryWriter,
    step_key: String,
}

impl TensorboardRecorder {
    /// Constructs a [`TensorboardRecorder`].
    ///
    /// TFRecord will be stored in `logdir`.
    pub fn new<P: AsRef<Path>>(logdir: P) -> Self {
        Self {
            writer: SummaryWriter::new(logdir),
            step_key: "iteration".to_string(),
        }
    }

    /// Sets the key of the step value.
    pub fn step_key(mut self, v: impl Into<String>) -> Self {
        self.step_key = v.into();
        self
    }
}

impl Recorder for TensorboardRecorder {
    /// Writes the scalars of a given [`Record`] into a TFRecord.
    ///
    /// Timestamps are discarded. A record without the step key is skipped.
    fn write(&mut self, record: Record) {
        let step = match record.get(&self.step_key) {
            Some(RecordValue::Scalar(v)) => *v as usize,
            _ => {
                warn!("Record without scalar {:?} skipped", self.step_key);
                return;
            }
        };

        for (k, v) in record.iter() {
            if *k == self.step_key {
                continue;
            }
            match v {
                RecordValue::Scalar(v) => self.writer.add_scalar(k, *v, step),
                RecordValue::DateTime(_) => {}
            };
        }
    }

    fn flush(&mut self) {
        self.writer.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_write_records() {
        let dir = TempDir::new("tensorboard").unwrap();
        let mut recorder = TensorboardRecorder::new(dir.path()).step_key("iteration");
        for i in 0..3 {
            let mut record = Record::from_scalar("iteration", i as f32);
            record.insert("player_avg_p_loss", RecordValue::Scalar(0.5 / (i + 1) as f32));
            record.insert("datetime", RecordValue::DateTime(chrono::Local::now()));
            recorder.write(record);
        }
        recorder.write(Record::from_scalar("player_avg_v_loss", 1.0));
        recorder.flush();

        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_some());
    }
}
