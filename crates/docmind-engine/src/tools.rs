//! Built-in tools exposed to the agent.
//!
//! `search_documents` wraps the retriever; the remaining tools are pure
//! analytics over caller-supplied data.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use docmind_agent::{ToolSchema, ToolSpec, ValueKind};
use docmind_core::{DocmindError, EmbeddingProvider, Query, Result, SearchFilters, ToolHandler};
use docmind_retrieve::Retriever;
use docmind_store::SqliteStore;

use crate::context::SourcePassage;

/// Semantic search over the ingested corpus.
///
/// Retryable: its failures are dominated by transient embedding provider
/// errors.
pub struct SearchDocumentsTool<P> {
    retriever: Arc<Retriever<SqliteStore, P>>,
    store: Arc<SqliteStore>,
    default_top_k: usize,
}

impl<P> SearchDocumentsTool<P>
where
    P: EmbeddingProvider,
{
    pub fn new(
        retriever: Arc<Retriever<SqliteStore, P>>,
        store: Arc<SqliteStore>,
        default_top_k: usize,
    ) -> Self {
        Self {
            retriever,
            store,
            default_top_k,
        }
    }

    pub fn spec() -> ToolSpec {
        ToolSpec {
            name: "search_documents".to_string(),
            description: "Semantic search over ingested documents".to_string(),
            input: ToolSchema::new()
                .field("query", ValueKind::String)
                .optional("top_k", ValueKind::Number)
                .optional("filters", ValueKind::Object),
            output: ToolSchema::new()
                .field("results", ValueKind::Array)
                .field("count", ValueKind::Number),
            retryable: true,
            max_retries: None,
        }
    }
}

#[async_trait]
impl<P> ToolHandler for SearchDocumentsTool<P>
where
    P: EmbeddingProvider,
{
    async fn call(&self, arguments: Value) -> Result<Value> {
        let text = arguments["query"].as_str().unwrap_or_default();
        let k = arguments["top_k"]
            .as_u64()
            .map(|v| v as usize)
            .unwrap_or(self.default_top_k);
        let filters: SearchFilters = match arguments.get("filters") {
            Some(v) if !v.is_null() => serde_json::from_value(v.clone())?,
            _ => SearchFilters::default(),
        };

        let query = Query::with_filters(text, filters);
        let retrieval = self.retriever.retrieve(&query, k).await?;
        debug!(results = retrieval.results.len(), "search_documents complete");

        let mut results = Vec::with_capacity(retrieval.results.len());
        for scored in &retrieval.results {
            let source = self
                .store
                .get_document(scored.chunk.document_id)?
                .map(|d| d.source_uri)
                .unwrap_or_else(|| "unknown".to_string());
            let passage = SourcePassage {
                text: scored.chunk.text.clone(),
                source,
                page: scored.chunk.page,
                score: scored.score,
            };
            results.push(json!({
                "text": passage.text,
                "source": passage.source,
                "page": passage.page,
                "score": passage.score,
                "document_id": scored.chunk.document_id.to_string(),
                "sequence_index": scored.chunk.sequence_index,
            }));
        }

        Ok(json!({ "count": results.len(), "results": results }))
    }
}

/// Z-score outlier detection over a numeric series.
pub struct DetectAnomaliesTool;

impl DetectAnomaliesTool {
    pub const DEFAULT_THRESHOLD: f64 = 2.0;

    pub fn spec() -> ToolSpec {
        ToolSpec {
            name: "detect_anomalies".to_string(),
            description: "Flag values whose z-score exceeds a threshold".to_string(),
            input: ToolSchema::new()
                .field("values", ValueKind::Array)
                .optional("threshold", ValueKind::Number),
            output: ToolSchema::new()
                .field("anomalies", ValueKind::Array)
                .field("mean", ValueKind::Number)
                .field("std_dev", ValueKind::Number),
            retryable: false,
            max_retries: None,
        }
    }
}

#[async_trait]
impl ToolHandler for DetectAnomaliesTool {
    async fn call(&self, arguments: Value) -> Result<Value> {
        let raw = arguments["values"]
            .as_array()
            .cloned()
            .unwrap_or_default();
        let mut values = Vec::with_capacity(raw.len());
        for v in &raw {
            match v.as_f64() {
                Some(n) => values.push(n),
                None => {
                    return Err(DocmindError::tool_contract(
                        "detect_anomalies",
                        "values must all be numbers",
                    ))
                }
            }
        }
        let threshold = arguments["threshold"]
            .as_f64()
            .unwrap_or(Self::DEFAULT_THRESHOLD);

        // Fewer than two values carries no distribution to deviate from.
        if values.len() < 2 {
            let mean = values.first().copied().unwrap_or(0.0);
            return Ok(json!({ "anomalies": [], "mean": mean, "std_dev": 0.0 }));
        }

        let mean = values.iter().sum::<f64>() / values.len() as f64;
        let variance =
            values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
        let std_dev = variance.sqrt();

        // A flat series has no outliers.
        let anomalies: Vec<Value> = if std_dev == 0.0 {
            Vec::new()
        } else {
            values
                .iter()
                .enumerate()
                .filter_map(|(index, &value)| {
                    let z = (value - mean) / std_dev;
                    (z.abs() > threshold).then(|| {
                        json!({ "index": index, "value": value, "z_score": z })
                    })
                })
                .collect()
        };

        Ok(json!({ "anomalies": anomalies, "mean": mean, "std_dev": std_dev }))
    }
}

/// Keyword-based expense categorization.
pub struct CategorizeExpensesTool;

const CATEGORY_KEYWORDS: &[(&str, &[&str])] = &[
    ("groceries", &["grocery", "supermarket", "market", "food store"]),
    ("dining", &["restaurant", "cafe", "coffee", "pizza", "dining", "takeout"]),
    ("transport", &["uber", "taxi", "fuel", "gas station", "transit", "parking", "train"]),
    ("utilities", &["electric", "water bill", "internet", "phone", "utility"]),
    ("housing", &["rent", "mortgage", "lease"]),
    ("entertainment", &["movie", "netflix", "spotify", "concert", "game"]),
];

fn categorize(description: &str) -> &'static str {
    let lower = description.to_lowercase();
    for (category, keywords) in CATEGORY_KEYWORDS {
        if keywords.iter().any(|kw| lower.contains(kw)) {
            return category;
        }
    }
    "other"
}

impl CategorizeExpensesTool {
    pub fn spec() -> ToolSpec {
        ToolSpec {
            name: "categorize_expenses".to_string(),
            description: "Assign expense items to spending categories by keyword".to_string(),
            input: ToolSchema::new().field("items", ValueKind::Array),
            output: ToolSchema::new()
                .field("items", ValueKind::Array)
                .field("totals", ValueKind::Object),
            retryable: false,
            max_retries: None,
        }
    }
}

#[async_trait]
impl ToolHandler for CategorizeExpensesTool {
    async fn call(&self, arguments: Value) -> Result<Value> {
        let raw = arguments["items"].as_array().cloned().unwrap_or_default();

        let mut items = Vec::with_capacity(raw.len());
        let mut totals: BTreeMap<&'static str, f64> = BTreeMap::new();
        for item in &raw {
            let description = match item["description"].as_str() {
                Some(d) => d,
                None => {
                    return Err(DocmindError::tool_contract(
                        "categorize_expenses",
                        "each item needs a string 'description'",
                    ))
                }
            };
            let amount = item["amount"].as_f64().unwrap_or(0.0);
            let category = categorize(description);
            *totals.entry(category).or_insert(0.0) += amount;
            items.push(json!({
                "description": description,
                "amount": amount,
                "category": category,
            }));
        }

        Ok(json!({ "items": items, "totals": totals }))
    }
}

/// Moving-average expense forecast with a 95% confidence interval.
pub struct ForecastExpensesTool;

impl ForecastExpensesTool {
    pub const DEFAULT_PERIODS: usize = 3;
    const WINDOW: usize = 3;
    const Z_95: f64 = 1.96;

    pub fn spec() -> ToolSpec {
        ToolSpec {
            name: "forecast_expenses".to_string(),
            description: "Forecast future periods from a moving average of recent values"
                .to_string(),
            input: ToolSchema::new()
                .field("values", ValueKind::Array)
                .optional("periods", ValueKind::Number),
            output: ToolSchema::new()
                .field("forecast", ValueKind::Array)
                .field("confidence_interval", ValueKind::Array)
                .field("method", ValueKind::String)
                .optional("baseline", ValueKind::Number),
            retryable: false,
            max_retries: None,
        }
    }
}

#[async_trait]
impl ToolHandler for ForecastExpensesTool {
    async fn call(&self, arguments: Value) -> Result<Value> {
        let raw = arguments["values"].as_array().cloned().unwrap_or_default();
        let mut values = Vec::with_capacity(raw.len());
        for v in &raw {
            match v.as_f64() {
                Some(n) => values.push(n),
                None => {
                    return Err(DocmindError::tool_contract(
                        "forecast_expenses",
                        "values must all be numbers",
                    ))
                }
            }
        }
        let periods = arguments["periods"]
            .as_u64()
            .map(|v| v as usize)
            .unwrap_or(Self::DEFAULT_PERIODS);

        if values.len() < Self::WINDOW {
            return Ok(json!({
                "forecast": [],
                "confidence_interval": [],
                "method": "insufficient_data",
            }));
        }

        let recent = &values[values.len() - Self::WINDOW..];
        let avg = recent.iter().sum::<f64>() / recent.len() as f64;
        // Sample standard deviation of the window.
        let variance = recent.iter().map(|v| (v - avg).powi(2)).sum::<f64>()
            / (recent.len() - 1) as f64;
        let std_dev = variance.sqrt();

        let forecast = vec![avg; periods];
        let confidence_interval: Vec<Value> = forecast
            .iter()
            .map(|f| json!([f - Self::Z_95 * std_dev, f + Self::Z_95 * std_dev]))
            .collect();

        Ok(json!({
            "forecast": forecast,
            "confidence_interval": confidence_interval,
            "method": "moving_average",
            "baseline": avg,
        }))
    }
}

/// Aggregate spending rollup: totals, per-category stats, top merchants.
pub struct AnalyzeSpendingTool;

impl AnalyzeSpendingTool {
    const TOP_MERCHANTS: usize = 5;

    pub fn spec() -> ToolSpec {
        ToolSpec {
            name: "analyze_spending_patterns".to_string(),
            description: "Summarize expense items by category and merchant".to_string(),
            input: ToolSchema::new().field("items", ValueKind::Array),
            output: ToolSchema::new()
                .field("total_transactions", ValueKind::Number)
                .field("total_amount", ValueKind::Number)
                .field("average_transaction", ValueKind::Number)
                .field("by_category", ValueKind::Object)
                .field("top_merchants", ValueKind::Array),
            retryable: false,
            max_retries: None,
        }
    }
}

#[async_trait]
impl ToolHandler for AnalyzeSpendingTool {
    async fn call(&self, arguments: Value) -> Result<Value> {
        let raw = arguments["items"].as_array().cloned().unwrap_or_default();

        if raw.is_empty() {
            return Ok(json!({
                "total_transactions": 0,
                "total_amount": 0.0,
                "average_transaction": 0.0,
                "by_category": {},
                "top_merchants": [],
            }));
        }

        let mut total_amount = 0.0;
        let mut by_category: BTreeMap<&'static str, (f64, usize)> = BTreeMap::new();
        let mut by_merchant: BTreeMap<String, f64> = BTreeMap::new();
        for item in &raw {
            let description = match item["description"].as_str() {
                Some(d) => d,
                None => {
                    return Err(DocmindError::tool_contract(
                        "analyze_spending_patterns",
                        "each item needs a string 'description'",
                    ))
                }
            };
            let amount = item["amount"].as_f64().unwrap_or(0.0);
            total_amount += amount;

            let entry = by_category.entry(categorize(description)).or_insert((0.0, 0));
            entry.0 += amount;
            entry.1 += 1;

            if let Some(merchant) = item["merchant"].as_str() {
                *by_merchant.entry(merchant.to_string()).or_insert(0.0) += amount;
            }
        }

        let categories: BTreeMap<&'static str, Value> = by_category
            .into_iter()
            .map(|(category, (sum, count))| {
                (
                    category,
                    json!({ "sum": sum, "count": count, "mean": sum / count as f64 }),
                )
            })
            .collect();

        let mut merchants: Vec<(String, f64)> = by_merchant.into_iter().collect();
        merchants.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        merchants.truncate(Self::TOP_MERCHANTS);
        let top_merchants: Vec<Value> = merchants
            .into_iter()
            .map(|(merchant, total)| json!({ "merchant": merchant, "total": total }))
            .collect();

        Ok(json!({
            "total_transactions": raw.len(),
            "total_amount": total_amount,
            "average_transaction": total_amount / raw.len() as f64,
            "by_category": categories,
            "top_merchants": top_merchants,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_detect_anomalies_flags_outlier() {
        let value = DetectAnomaliesTool
            .call(json!({ "values": [10.0, 11.0, 9.0, 10.5, 9.5, 120.0] }))
            .await
            .unwrap();
        let anomalies = value["anomalies"].as_array().unwrap();
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0]["index"], 5);
        assert!(anomalies[0]["z_score"].as_f64().unwrap() > 2.0);
    }

    #[tokio::test]
    async fn test_detect_anomalies_flat_series() {
        let value = DetectAnomaliesTool
            .call(json!({ "values": [5, 5, 5, 5] }))
            .await
            .unwrap();
        assert!(value["anomalies"].as_array().unwrap().is_empty());
        assert_eq!(value["std_dev"], 0.0);
    }

    #[tokio::test]
    async fn test_detect_anomalies_degenerate_inputs() {
        let empty = DetectAnomaliesTool
            .call(json!({ "values": [] }))
            .await
            .unwrap();
        assert!(empty["anomalies"].as_array().unwrap().is_empty());
        assert_eq!(empty["mean"], 0.0);
        assert_eq!(empty["std_dev"], 0.0);

        let single = DetectAnomaliesTool
            .call(json!({ "values": [42.5] }))
            .await
            .unwrap();
        assert!(single["anomalies"].as_array().unwrap().is_empty());
        assert_eq!(single["mean"], 42.5);
    }

    #[tokio::test]
    async fn test_detect_anomalies_rejects_non_numeric() {
        let err = DetectAnomaliesTool
            .call(json!({ "values": [1, "two", 3] }))
            .await
            .unwrap_err();
        assert!(matches!(err, DocmindError::ToolContractViolation { .. }));
    }

    #[tokio::test]
    async fn test_forecast_repeats_recent_average() {
        let value = ForecastExpensesTool
            .call(json!({ "values": [500.0, 500.0, 100.0, 110.0, 90.0], "periods": 2 }))
            .await
            .unwrap();

        assert_eq!(value["method"], "moving_average");
        let forecast = value["forecast"].as_array().unwrap();
        assert_eq!(forecast.len(), 2);
        // Window is the last three values: mean 100.
        assert!((forecast[0].as_f64().unwrap() - 100.0).abs() < 1e-9);
        assert_eq!(value["baseline"], forecast[0]);

        let ci = value["confidence_interval"].as_array().unwrap();
        assert_eq!(ci.len(), 2);
        let (low, high) = (ci[0][0].as_f64().unwrap(), ci[0][1].as_f64().unwrap());
        assert!(low < 100.0 && high > 100.0);
        // Sample std of [100, 110, 90] is 10; 1.96 sigma either side.
        assert!((high - 100.0 - 19.6).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_forecast_needs_three_values() {
        let value = ForecastExpensesTool
            .call(json!({ "values": [100.0, 200.0] }))
            .await
            .unwrap();
        assert_eq!(value["method"], "insufficient_data");
        assert!(value["forecast"].as_array().unwrap().is_empty());
        assert!(value["confidence_interval"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_analyze_spending_rollup() {
        let value = AnalyzeSpendingTool
            .call(json!({ "items": [
                { "description": "Whole Foods Supermarket", "amount": 80.0, "merchant": "Whole Foods" },
                { "description": "Corner grocery run", "amount": 20.0, "merchant": "Corner Market" },
                { "description": "Uber trip downtown", "amount": 30.0, "merchant": "Uber" },
            ]}))
            .await
            .unwrap();

        assert_eq!(value["total_transactions"], 3);
        assert_eq!(value["total_amount"], 130.0);
        assert!((value["average_transaction"].as_f64().unwrap() - 130.0 / 3.0).abs() < 1e-9);

        let groceries = &value["by_category"]["groceries"];
        assert_eq!(groceries["sum"], 100.0);
        assert_eq!(groceries["count"], 2);
        assert_eq!(groceries["mean"], 50.0);

        let merchants = value["top_merchants"].as_array().unwrap();
        assert_eq!(merchants[0]["merchant"], "Whole Foods");
        assert_eq!(merchants[0]["total"], 80.0);
    }

    #[tokio::test]
    async fn test_analyze_spending_empty_items() {
        let value = AnalyzeSpendingTool
            .call(json!({ "items": [] }))
            .await
            .unwrap();
        assert_eq!(value["total_transactions"], 0);
        assert_eq!(value["average_transaction"], 0.0);
        assert!(value["top_merchants"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_categorize_known_and_unknown() {
        let value = CategorizeExpensesTool
            .call(json!({ "items": [
                { "description": "Whole Foods Supermarket", "amount": 82.10 },
                { "description": "Uber trip downtown", "amount": 14.50 },
                { "description": "Mystery charge", "amount": 9.99 },
            ]}))
            .await
            .unwrap();

        let items = value["items"].as_array().unwrap();
        assert_eq!(items[0]["category"], "groceries");
        assert_eq!(items[1]["category"], "transport");
        assert_eq!(items[2]["category"], "other");
        assert_eq!(value["totals"]["groceries"], 82.10);
    }
}
