//! Key types and path hashing for read-only CASC access
//!
//! # Components
//!
//! - **Keys**: [`ContentKey`], [`EncodingKey`] and the nine-byte [`IndexKey`]
//! - **Hashing**: Jenkins lookup3 `hashlittle2()` and the stable [`name_hash`]
//!   that root tables use in place of file names
//!
//! # Examples
//!
//! ```
//! use cascread_crypto::{EncodingKey, name_hash};
//!
//! let ekey = EncodingKey::from_hex("00112233445566778899aabbccddeeff").unwrap();
//! println!("Index key: {}", ekey.truncated());
//! println!("Name hash: {:016x}", name_hash("Interface/Icons/INV_Misc_QuestionMark.blp"));
//! ```

#![warn(missing_docs)]

pub mod jenkins;
pub mod keys;

pub use jenkins::{hashlittle2, name_hash};
pub use keys::{ContentKey, EncodingKey, INDEX_KEY_LEN, IndexKey};
