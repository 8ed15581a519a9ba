//! Contract interfaces touched by the sweep.

use alloy::primitives::Address;
use alloy::sol;

sol! {
    interface IERC721Enumerable {
        function balanceOf(address owner) external view returns (uint256);
        function tokenOfOwnerByIndex(address owner, uint256 index) external view returns (uint256);
    }

    interface IDelegationRegistry {
        struct DelegationInfo {
            uint64 delegatedAt;
            uint64 expiryTs;
            uint64 permissionBitMap;
        }

        function getDelegationInfo(uint256 tokenId)
            external
            view
            returns (address delegatee, DelegationInfo memory info);

        function bulkRevokeDelegations(uint256[] calldata tokenIds) external;
    }
}

/// Delegatee recorded for a token that has never been delegated.
pub const NO_DELEGATEE: Address = Address::ZERO;
