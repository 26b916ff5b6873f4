//! User-facing message texts. Every envelope message originates here.

pub const MSG_SAVE_SUCCESS: &str = "Data Saved Successfully !!";
pub const MSG_REQUEST_FAILED: &str = "Could not process request. Try later !!";
pub const MSG_INVALID_ID: &str = "Invalid Identifier";
pub const MSG_BAD_INPUT: &str = "Bad request params";
pub const MSG_DUPLICATE_RECORD: &str = "Duplicate Record";
pub const MSG_NO_RECORD: &str = "No Record Found";
pub const MSG_UNAUTHORIZED_ACCESS: &str = "Unauthorized access !!";
pub const MSG_CORRUPT_DATA: &str = "Corrupted data received !!";
