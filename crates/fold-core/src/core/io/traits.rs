use crate::core::models::pose::Pose;
use std::error::Error;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Common interface for structure file formats that load into and save from a [`Pose`].
///
/// Implementors handle the format-specific parsing and serialization; the path-based
/// helpers wrap them with buffered file handles.
pub trait StructureFile {
    /// Format-specific data that is carried alongside the pose (headers, remarks).
    type Metadata: Default;

    /// The error type for I/O operations.
    type Error: Error + From<io::Error>;

    /// Reads a pose from a buffered reader.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing fails or the reader fails.
    fn read_from(reader: &mut impl BufRead) -> Result<(Pose, Self::Metadata), Self::Error>;

    /// Writes a pose and its metadata to a writer.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write_to(
        pose: &Pose,
        metadata: &Self::Metadata,
        writer: &mut impl Write,
    ) -> Result<(), Self::Error>;

    /// Writes a pose with default metadata.
    fn write_pose_to(pose: &Pose, writer: &mut impl Write) -> Result<(), Self::Error> {
        Self::write_to(pose, &Self::Metadata::default(), writer)
    }

    /// Reads a pose from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or parsing fails.
    fn read_from_path<P: AsRef<Path>>(path: P) -> Result<(Pose, Self::Metadata), Self::Error> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::read_from(&mut reader)
    }

    /// Writes a pose and its metadata to a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or writing fails.
    fn write_to_path<P: AsRef<Path>>(
        pose: &Pose,
        metadata: &Self::Metadata,
        path: P,
    ) -> Result<(), Self::Error> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        Self::write_to(pose, metadata, &mut writer)?;
        writer.flush()?;
        Ok(())
    }

    fn write_pose_to_path<P: AsRef<Path>>(pose: &Pose, path: P) -> Result<(), Self::Error> {
        Self::write_to_path(pose, &Self::Metadata::default(), path)
    }
}
