use serde::{Deserialize, Serialize};

/// Response of the symbol search endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StockSearch {
    #[serde(default)]
    pub quotes: Vec<StockQuote>,
    #[serde(default)]
    pub news: Vec<StockNews>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockQuote {
    pub symbol: String,
    #[serde(default)]
    pub exchange: Option<String>,
    #[serde(default)]
    pub index: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub type_disp: Option<String>,
    #[serde(default)]
    pub quote_type: Option<String>,
    #[serde(default)]
    pub longname: Option<String>,
    #[serde(default)]
    pub shortname: Option<String>,
}

impl StockQuote {
    pub fn is_equity(&self) -> bool {
        self.type_disp.as_deref() == Some("Equity")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockNews {
    pub uuid: String,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub publisher: Option<String>,
}
