//! Domain values shared by the wallet machines.

use std::fmt;
use std::str::FromStr;

/// Wei in one ether
pub const WEI_PER_ETH: u128 = 1_000_000_000_000_000_000;

/// Pseudo-address standing for ether in token transfers
pub const ETH_TOKEN: Address = Address([0xEE; 20]);

/// Recipient of the demo transfer
pub const DEFAULT_RECIPIENT: Address = Address([
    0xba, 0xcb, 0x43, 0xa8, 0x6f, 0xd1, 0x5f, 0x50, 0x69, 0xe9, 0x38, 0xa2, 0xf6, 0x0a, 0x98, 0x56, 0xc4, 0xfb, 0xc5,
    0x44,
]);

/// Amount of the demo transfer (0.01 ETH)
pub const DEFAULT_TRANSFER_AMOUNT: Wei = Wei(10_000_000_000_000_000);

/// A 20-byte account address
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address(pub [u8; 20]);

impl Address {
    /// Parse `0x`-prefixed or bare hex; `None` unless exactly 40 hex digits
    #[must_use]
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.strip_prefix("0x").unwrap_or(hex);
        if hex.len() != 40 {
            return None;
        }
        let mut bytes = [0_u8; 20];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(hex.get(2 * i..2 * i + 2)?, 16).ok()?;
        }
        Some(Self(bytes))
    }
}

impl FromStr for Address {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s).ok_or_else(|| format!("not a 20-byte hex address: {s}"))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("0x")?;
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

/// An amount of ether in wei
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Wei(pub u128);

impl Wei {
    /// Nothing
    pub const ZERO: Self = Self(0);

    /// Whole ether plus thousandths; finer digits are dropped
    #[must_use]
    #[allow(clippy::cast_precision_loss)] // Display value only
    pub fn to_eth(self) -> f64 {
        let whole = self.0 / WEI_PER_ETH;
        let milli = (self.0 % WEI_PER_ETH) / (WEI_PER_ETH / 1000);
        whole as f64 + milli as f64 / 1000.0
    }
}

/// A wallet the keystore can sign for
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Wallet {
    /// The wallet's address
    pub address: Address,
}

impl Wallet {
    /// Wallet at `address`
    #[must_use]
    pub const fn new(address: Address) -> Self {
        Self { address }
    }
}

/// Arguments of a token transfer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransferInputs {
    /// Paying wallet
    pub wallet: Address,
    /// Token contract, or [`ETH_TOKEN`]
    pub token: Address,
    /// Recipient
    pub to: Address,
    /// Amount in the token's base unit
    pub amount: Wei,
}
