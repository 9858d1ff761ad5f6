use serde::{Deserialize, Serialize};

/// The three reference categories a trade can point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceKind {
    Asset,
    Session,
    Setup,
}

impl ReferenceKind {
    /// Table the kind is stored in.
    pub fn table(self) -> &'static str {
        match self {
            ReferenceKind::Asset => "assets",
            ReferenceKind::Session => "sessions",
            ReferenceKind::Setup => "setups",
        }
    }

    /// Column on `trades` that references this kind.
    pub fn trade_column(self) -> &'static str {
        match self {
            ReferenceKind::Asset => "asset_id",
            ReferenceKind::Session => "session_id",
            ReferenceKind::Setup => "setup_id",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ReferenceKind::Asset => "asset",
            ReferenceKind::Session => "session",
            ReferenceKind::Setup => "setup",
        }
    }
}

/// A named reference entity (asset, session or setup).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceItem {
    pub id: String,
    pub name: String,
}
