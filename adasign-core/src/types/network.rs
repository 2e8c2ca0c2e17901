use serde::{Deserialize, Serialize};
use std::fmt;

/// Network discriminant carried in Shelley address headers
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum NetworkId {
    Testnet = 0,
    Mainnet = 1,
}

impl From<NetworkId> for u8 {
    fn from(id: NetworkId) -> Self {
        id as u8
    }
}

impl TryFrom<u8> for NetworkId {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(NetworkId::Testnet),
            1 => Ok(NetworkId::Mainnet),
            other => Err(format!("unknown network id {other}")),
        }
    }
}

/// Protocol magics of the known networks
pub mod protocol_magic {
    pub const MAINNET: u32 = 764824073;
    pub const HASKELL_TESTNET: u32 = 42;
    pub const MARY_TESTNET: u32 = 1097911063;
}

/// Immutable description of the network a crypto provider is bound to
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Network {
    pub name: String,
    pub network_id: NetworkId,
    pub protocol_magic: u32,
    /// First slot of the Shelley era
    pub era_start_slot: u64,
    /// Unix time (milliseconds) of `era_start_slot`
    pub era_start_date_time: u64,
    pub epochs_to_reward_distribution: u32,
    /// Smallest amount of lovelace an output may carry
    pub minimal_output: u64,
}

impl Network {
    pub fn mainnet() -> Self {
        Self {
            name: "mainnet".to_owned(),
            network_id: NetworkId::Mainnet,
            protocol_magic: protocol_magic::MAINNET,
            era_start_slot: 4_492_800,
            era_start_date_time: 1_596_059_091_000,
            epochs_to_reward_distribution: 4,
            minimal_output: 1_000_000,
        }
    }

    pub fn haskell_testnet() -> Self {
        Self {
            name: "haskell-testnet".to_owned(),
            network_id: NetworkId::Testnet,
            protocol_magic: protocol_magic::HASKELL_TESTNET,
            era_start_slot: 1_598_400,
            era_start_date_time: 1_595_967_616_000,
            epochs_to_reward_distribution: 4,
            minimal_output: 1_000_000,
        }
    }

    pub fn mary_testnet() -> Self {
        Self {
            name: "mary-testnet".to_owned(),
            network_id: NetworkId::Testnet,
            protocol_magic: protocol_magic::MARY_TESTNET,
            era_start_slot: 0,
            era_start_date_time: 1_604_489_400_000,
            epochs_to_reward_distribution: 4,
            minimal_output: 1_000_000,
        }
    }

    pub fn is_mainnet(&self) -> bool {
        self.network_id == NetworkId::Mainnet
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (magic {})", self.name, self.protocol_magic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_serde_uses_camel_case() {
        let json = serde_json::to_value(Network::mainnet()).unwrap();
        assert_eq!(json["networkId"], 1);
        assert_eq!(json["protocolMagic"], 764824073);
        let back: Network = serde_json::from_value(json).unwrap();
        assert_eq!(back, Network::mainnet());
    }

    #[test]
    fn rejects_unknown_network_id() {
        assert!(NetworkId::try_from(7).is_err());
        assert!(!Network::mary_testnet().is_mainnet());
    }
}
