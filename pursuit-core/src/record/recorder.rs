use super::Record;

/// Writes a record to an output destination with [`Recorder::write`].
pub trait Recorder {
    /// Writes a record.
    fn write(&mut self, record: Record);

    /// Flushes records written so far, if the destination buffers them.
    fn flush(&mut self) {}
}
