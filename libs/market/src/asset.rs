/// Static reference data for one tracked asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetDescriptor {
    pub symbol: &'static str,
    pub display_name: &'static str,
    pub currency_symbol: &'static str,
}

pub const ASSETS: &[AssetDescriptor] = &[
    AssetDescriptor {
        symbol: "BTC/USD",
        display_name: "Bitcoin",
        currency_symbol: "$",
    },
    AssetDescriptor {
        symbol: "ETH/USD",
        display_name: "Ethereum",
        currency_symbol: "$",
    },
    AssetDescriptor {
        symbol: "XAU/USD",
        display_name: "Gold",
        currency_symbol: "$",
    },
    AssetDescriptor {
        symbol: "SPY",
        display_name: "S&P 500",
        currency_symbol: "$",
    },
    AssetDescriptor {
        symbol: "EUR/USD",
        display_name: "Euro",
        currency_symbol: "$",
    },
];

pub const ALL_ASSETS_PHRASE: &str = "All assets";

pub fn find_by_symbol(symbol: &str) -> Option<&'static AssetDescriptor> {
    let symbol = symbol.trim();
    ASSETS.iter().find(|a| a.symbol.eq_ignore_ascii_case(symbol))
}

pub fn find_by_display_name(name: &str) -> Option<&'static AssetDescriptor> {
    let name = name.trim();
    ASSETS.iter().find(|a| a.display_name.eq_ignore_ascii_case(name))
}

/// What an inbound chat command asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Menu,
    All,
    One(&'static AssetDescriptor),
}

impl Selection {
    pub fn parse(text: &str) -> Option<Selection> {
        let text = text.trim();

        if text.eq_ignore_ascii_case("/start") {
            return Some(Selection::Menu);
        }
        if text.eq_ignore_ascii_case(ALL_ASSETS_PHRASE) {
            return Some(Selection::All);
        }

        find_by_display_name(text)
            .or_else(|| find_by_symbol(text))
            .map(Selection::One)
    }

    /// Assets to process; the menu itself selects none.
    pub fn assets(&self) -> Vec<&'static AssetDescriptor> {
        match self {
            Selection::Menu => Vec::new(),
            Selection::All => ASSETS.iter().collect(),
            Selection::One(asset) => vec![*asset],
        }
    }
}
