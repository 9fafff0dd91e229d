/// One rejected input record, accumulated in per-run memory and flushed once at run finalization.
#[derive(Debug, Clone)]
pub struct Reject {
    pub raw_data: String,
    pub reason: String,
    pub is_parse_error: bool,
}
