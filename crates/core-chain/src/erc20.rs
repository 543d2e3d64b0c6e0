//! Minimal ERC-20 binding (§6.4): only the three functions/events this
//! gateway actually calls. Not a general-purpose ABI toolkit.

use ethers::contract::abigen;

abigen!(
    Erc20,
    r#"[
        function balanceOf(address account) external view returns (uint256)
        function transfer(address to, uint256 amount) external returns (bool)
        event Transfer(address indexed from, address indexed to, uint256 value)
    ]"#
);
