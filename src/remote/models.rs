use serde::Deserialize;

/// One entry of a catalog, keyed by its string id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogItem {
    pub id: String,
    pub name: String,

    /// Present only for items listed from an owned catalog
    pub usage: Option<OwnedUsage>,
}

impl CatalogItem {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            usage: None,
        }
    }
}

/// Play statistics reported for an owned item
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct OwnedUsage {
    #[serde(default)]
    pub playtime_forever: Option<u64>,
    #[serde(default, rename = "playtime_windows_forever")]
    pub playtime_windows: Option<u64>,
    #[serde(default, rename = "playtime_mac_forever")]
    pub playtime_mac: Option<u64>,
    #[serde(default, rename = "playtime_linux_forever")]
    pub playtime_linux: Option<u64>,
    #[serde(default, rename = "rtime_last_played")]
    pub last_played: Option<u64>,
    #[serde(default)]
    pub has_community_visible_stats: Option<bool>,
}

/// `applist.apps[]` entry
#[derive(Debug, Deserialize)]
pub(crate) struct RawApp {
    pub appid: u64,
    #[serde(default)]
    pub name: String,
}

impl From<RawApp> for CatalogItem {
    fn from(raw: RawApp) -> Self {
        Self::new(raw.appid.to_string(), raw.name)
    }
}

/// `response.games[]` entry
#[derive(Debug, Deserialize)]
pub(crate) struct RawOwnedApp {
    pub appid: u64,
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub usage: OwnedUsage,
}

impl From<RawOwnedApp> for CatalogItem {
    fn from(raw: RawOwnedApp) -> Self {
        Self {
            id: raw.appid.to_string(),
            name: raw.name,
            usage: Some(raw.usage),
        }
    }
}

/// Detail lookup result for one id
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DetailPayload {
    #[serde(default)]
    pub success: bool,

    #[serde(default)]
    pub data: Option<DetailData>,
}

/// The part of a detail record the classifier reads
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DetailData {
    /// Id the remote resolved the request to, which may differ from the one asked for
    pub steam_appid: u64,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// A market listing for an item's collectibles
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "RawListing")]
pub struct MarketListing {
    pub app_id: u64,
    pub name: String,
    pub market_hash_name: String,
    pub item_type: String,
    pub sell_listings: u64,
    pub sell_price_text: String,
}

#[derive(Debug, Deserialize)]
struct RawListing {
    asset_description: AssetDescription,
    #[serde(default)]
    sell_listings: u64,
    #[serde(default)]
    sell_price_text: String,
}

#[derive(Debug, Deserialize)]
struct AssetDescription {
    appid: u64,
    name: String,
    market_hash_name: String,
    #[serde(rename = "type", default)]
    item_type: String,
}

impl From<RawListing> for MarketListing {
    fn from(raw: RawListing) -> Self {
        Self {
            app_id: raw.asset_description.appid,
            name: raw.asset_description.name,
            market_hash_name: raw.asset_description.market_hash_name,
            item_type: raw.asset_description.item_type,
            sell_listings: raw.sell_listings,
            sell_price_text: raw.sell_price_text,
        }
    }
}

/// Market item class tags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemClass {
    Card,
    Background,
    Emoticon,
    Booster,
    SaleItem,
    Consumable,
}

impl ItemClass {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Card => "tag_item_class_2",
            Self::Background => "tag_item_class_3",
            Self::Emoticon => "tag_item_class_4",
            Self::Booster => "tag_item_class_5",
            Self::Consumable => "tag_item_class_6",
            Self::SaleItem => "tag_item_class_10",
        }
    }
}

/// Card border tags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardBorder {
    Normal,
    Foil,
}

impl CardBorder {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Normal => "tag_cardborder_0",
            Self::Foil => "tag_cardborder_1",
        }
    }
}

/// Narrows a market search to one kind of collectible
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CardFilter {
    pub item_class: Option<ItemClass>,
    pub border: Option<CardBorder>,
}

impl CardFilter {
    /// Regular trading cards, the filter the classifier uses
    pub const TRADING_CARDS: CardFilter = CardFilter {
        item_class: Some(ItemClass::Card),
        border: Some(CardBorder::Normal),
    };

    pub const ANY: CardFilter = CardFilter {
        item_class: None,
        border: None,
    };
}

impl Default for CardFilter {
    fn default() -> Self {
        Self::TRADING_CARDS
    }
}
