//! Fixed literals of the outcome message schemas.

/// Message type of a judgment package published with a presigned link.
pub const MESSAGE_TYPE_JUDGMENT_PACKAGE_AVAILABLE: &str =
    "uk.gov.nationalarchives.tre.messages.judgmentpackage.available.JudgmentPackageAvailable";

/// Message type of a court document package stored without a link.
pub const MESSAGE_TYPE_COURT_DOCUMENT_PACKAGE_AVAILABLE: &str =
    "uk.gov.nationalarchives.tre.messages.courtdocumentpackage.available.CourtDocumentPackageAvailable";

/// Message type of the generic error message.
pub const MESSAGE_TYPE_ERROR: &str = "uk.gov.nationalarchives.tre.messages.Error";

/// Path of the metadata document inside every package.
pub const METADATA_FILE_PATH: &str = "/metadata.json";

pub const METADATA_FILE_TYPE: &str = "Json";

/// Extension of the produced archive.
pub const ARCHIVE_EXTENSION: &str = "tar.gz";
