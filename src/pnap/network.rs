//! Externally usable address selection.

use crate::pnap::error::PnapDriverError;

/// Picks the externally usable address from the server's address sets.
///
/// With private networking enabled the first private address is used;
/// otherwise the first public address. No ordering preference beyond list
/// order is applied.
pub(crate) fn resolve_ip<'a>(
    private_networking: bool,
    private: &'a [String],
    public: &'a [String],
) -> Result<&'a str, PnapDriverError> {
    if private_networking {
        private
            .first()
            .map(String::as_str)
            .ok_or(PnapDriverError::NoPrivateAddress)
    } else {
        public
            .first()
            .map(String::as_str)
            .ok_or(PnapDriverError::NoPublicAddress)
    }
}
