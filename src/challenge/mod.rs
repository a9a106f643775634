//! Challenge Layer
//!
//! Turning a captured puzzle into something a friend can open, and back.
//!
//! ## Module Structure
//!
//! - `record`: Challenge record, versioned wire shapes, legacy migration
//! - `codec`: JSON + base64 token encoding
//! - `link`: `challenge` query parameter in share URLs, old `items` links
//! - `share`: Ordered share strategies (native, clipboard, manual) and QR payloads

pub mod record;
pub mod codec;
pub mod link;
pub mod share;

pub use record::{ChallengeRecord, WireChallenge, CHALLENGE_VERSION};
pub use codec::{decode_challenge, encode_challenge, ChallengeError};
pub use link::{challenge_from_url, challenge_link, shared_items_from_url, CHALLENGE_PARAM, ITEMS_PARAM};
pub use share::{
    share_text, ManualCopy, QrRenderer, ShareChain, ShareError, ShareMethod, ShareOutcome,
    SharePayload, ShareStrategy, SHARE_TITLE,
};
