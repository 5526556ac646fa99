// Field name constants to ensure consistency across the codebase.
// These match the column headers of the inventory exports.

pub const PID: &str = "PID";
pub const PARENT_PID: &str = "parent_PID";
pub const CONTENT_MODEL: &str = "content_model";
pub const FILETYPE: &str = "filetype";
pub const FILE_SIZE: &str = "file_size";
pub const FILE_PATH: &str = "file_path";
pub const MODS_PATH: &str = "mods_path";
pub const RDF_PATH: &str = "rdf_path";
pub const INSTITUTION: &str = "institution";
pub const COLLECTION_NAME: &str = "Collection_name";

/// Attribute columns carried by every datastream extract, in the column order
/// the extracts are exported with (after the leading PID column).
pub const DATASTREAM_ATTRIBUTES: [&str; 7] = [
    FILETYPE,
    FILE_SIZE,
    INSTITUTION,
    COLLECTION_NAME,
    FILE_PATH,
    MODS_PATH,
    RDF_PATH,
];

/// Fields blanked on records whose content model is not file-bearing.
pub const FILE_FIELDS: [&str; 3] = [FILETYPE, FILE_SIZE, FILE_PATH];

/// Marker that identifies collection-level parents.
pub const COLLECTION_MARKER: &str = "collection";

// Datastream IDs used in repository download URLs
pub const MODS_STREAM: &str = "MODS";
pub const RELS_EXT_STREAM: &str = "RELS-EXT";

// Content models whose records carry file metadata
pub const NEWSPAPER_ISSUE_CMODEL: &str = "newspaperIssueCModel";
pub const LARGE_IMAGE_CMODEL: &str = "sp_large_image_cmodel";
pub const AUDIO_CMODEL: &str = "sp-audioCmodel";
pub const VIDEO_CMODEL: &str = "sp_videoCmodel";
pub const REMOTE_RESOURCE_CMODEL: &str = "sp_remote_resource";

pub fn default_content_models() -> Vec<String> {
    [
        NEWSPAPER_ISSUE_CMODEL,
        LARGE_IMAGE_CMODEL,
        AUDIO_CMODEL,
        VIDEO_CMODEL,
        REMOTE_RESOURCE_CMODEL,
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

// Default input file names produced by the inventory export
pub const MASTER_FILE: &str = "PID_all_pids_with_relationships.csv";
pub const PDF_SOURCE: &str = "pdf";
pub const OBJ_SOURCE: &str = "obj";
pub const MODS_SOURCE: &str = "mods";
pub const PDF_DATASTREAM_FILE: &str = "datastream-data-pdf.csv";
pub const OBJ_DATASTREAM_FILE: &str = "datastream-data-obj.csv";
pub const MODS_DATASTREAM_FILE: &str = "datastream-data-mods.csv";

// Output naming
pub const PRE_PROCESSED_PREFIX: &str = "pre-processed-";
pub const PROCESSED_PREFIX: &str = "processed-";

/// Base output file name for a dataset, e.g. `full-LIB-foo-output.csv`.
pub fn output_file_name(dataset: &str) -> String {
    format!("full-{dataset}-output.csv")
}

/// Dataset prefix of a PID: everything before the first `:`.
pub fn dataset_prefix(pid: &str) -> &str {
    pid.split(':').next().unwrap_or(pid)
}

/// Institution code of a PID: everything before the first `-`.
pub fn institution_of(pid: &str) -> &str {
    pid.split('-').next().unwrap_or(pid)
}
