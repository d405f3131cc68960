use serde::Deserialize;

/// `XML_daily.asp` document: `<ValCurs Date="dd.mm.yyyy"><Valute ID="..">..</Valute>..</ValCurs>`.
#[derive(Debug, Clone, Deserialize)]
pub struct DailyDocument {
    #[serde(rename = "@Date", default)]
    pub date: String,
    #[serde(rename = "Valute", default)]
    pub valutes: Vec<RawValute>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawValute {
    #[serde(rename = "@ID")]
    pub id: String,
    #[serde(rename = "NumCode", default)]
    pub num_code: Option<String>,
    #[serde(rename = "CharCode")]
    pub char_code: String,
    #[serde(rename = "Nominal")]
    pub nominal: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Value")]
    pub value: String,
}

/// `XML_dynamic.asp` document. An empty range comes back as a bare `<ValCurs .../>`.
#[derive(Debug, Clone, Deserialize)]
pub struct DynamicDocument {
    #[serde(rename = "@ID", default)]
    pub id: String,
    #[serde(rename = "Record", default)]
    pub records: Vec<RawRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawRecord {
    #[serde(rename = "@Date")]
    pub date: String,
    #[serde(rename = "Value")]
    pub value: String,
}
