/// Identifier for the remote source that produced a batch.
/// Examples: `sharelm`, `scripted`
pub type SourceId = String;
/// Category label read from a record's `source` field.
/// Examples: `chatgpt`, `bard`, `unknown`
pub type CategoryLabel = String;
/// Hugging Face dataset id.
/// Example: `shachardon/ShareLM`
pub type DatasetId = String;
/// Absolute row offset into the remote split.
pub type RowOffset = usize;
