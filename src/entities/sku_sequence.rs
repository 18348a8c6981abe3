//! SKU sequence entity - Per-keyword counters for generated SKUs.
//! Keyed by a short hash of the keyword string (e.g. `"ELEC-MONI"`).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// SKU sequence database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sku_sequences")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// First 8 hex chars of the MD5 of the lowercased keywords
    #[sea_orm(unique)]
    pub keyword_hash: String,
    /// The keyword string the hash was computed from
    pub keywords: String,
    /// Last sequence number handed out
    pub current_sequence: i32,
    /// When the counter last moved
    pub updated_at: DateTimeUtc,
}

/// `SkuSequence` has no relationships with other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
