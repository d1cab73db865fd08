pub mod metadata;
pub mod naming;
pub mod recording_file;
pub mod wav_writer;
