pub const DEFAULT_STUN_ADDR: &str = "stun:stun1.l.google.com:19302";
pub const DEFAULT_STUN_ADDR_2: &str = "stun:stun2.l.google.com:19302";

/// Number of candidates the transport pre-gathers before an offer exists.
pub const DEFAULT_CANDIDATE_POOL_SIZE: u8 = 10;

/// Query parameter carrying the session id in a join link.
pub const JOIN_TOKEN_PARAM: &str = "token";
