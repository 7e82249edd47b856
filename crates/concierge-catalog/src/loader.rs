//! CSV catalog loading.
//!
//! The catalog file must carry the columns `id`, `title`, `description`,
//! `category`, `location` and `budget`. Rows without a title or description
//! are dropped, as are rows whose id was already seen. The budget column may
//! be formatted (`₹15,000`, `15000.00`); only the whole-rupee digits are kept.

use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

use concierge_core::CatalogItem;
use tracing::{info, warn};

use crate::error::CatalogError;

const REQUIRED_COLUMNS: [&str; 6] = ["id", "title", "description", "category", "location", "budget"];

/// Load catalog items from a CSV file on disk.
pub fn load_catalog_csv(path: &Path) -> Result<Vec<CatalogItem>, CatalogError> {
    let file = std::fs::File::open(path)
        .map_err(|e| CatalogError::Load(format!("{}: {}", path.display(), e)))?;
    let items = parse_catalog(file)?;
    info!(path = %path.display(), items = items.len(), "Catalog loaded");
    Ok(items)
}

/// Parse catalog items from any CSV reader.
pub fn parse_catalog<R: Read>(reader: R) -> Result<Vec<CatalogItem>, CatalogError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    let position = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim_start_matches('\u{feff}').eq_ignore_ascii_case(name))
    };

    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|col| position(col).is_none())
        .collect();
    if !missing.is_empty() {
        return Err(CatalogError::Load(format!(
            "Missing required columns: {}",
            missing.join(", ")
        )));
    }

    // Presence of every column was checked above.
    let col: Vec<usize> = REQUIRED_COLUMNS
        .iter()
        .filter_map(|name| position(name))
        .collect();
    let (id_col, title_col, desc_col, cat_col, loc_col, budget_col) =
        (col[0], col[1], col[2], col[3], col[4], col[5]);

    let mut seen = HashSet::new();
    let mut items = Vec::new();

    for (row, record) in csv_reader.records().enumerate() {
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                warn!(row, error = %e, "Skipping unreadable catalog row");
                continue;
            }
        };
        let field = |idx: usize| record.get(idx).unwrap_or("").to_string();

        let id = field(id_col);
        let title = field(title_col);
        let description = field(desc_col);
        if id.is_empty() || title.is_empty() || description.is_empty() {
            continue;
        }
        if !seen.insert(id.clone()) {
            continue;
        }

        let budget = field(budget_col);
        let Some(price) = parse_price(&budget) else {
            warn!(row, id = %id, budget = %budget, "Skipping catalog row with unreadable budget");
            continue;
        };

        items.push(CatalogItem {
            id,
            title,
            description,
            category: field(cat_col),
            location: field(loc_col),
            price,
        });
    }

    Ok(items)
}

/// Extract whole rupees from a budget cell: digits before any decimal point,
/// ignoring currency symbols and thousands separators.
pub fn parse_price(raw: &str) -> Option<u64> {
    let start = raw.find(|c: char| c.is_ascii_digit())?;
    let integer_part = raw[start..].split('.').next().unwrap_or("");
    let digits: String = integer_part.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = "\
id,title,description,category,location,budget
1,Beach Paradise,Sun and sand,Relaxation,Goa,15000
2,Himalayan Trek,Mountain trail,Adventure,Himachal,\"₹22,500\"
1,Duplicate Beach,Other text,Relaxation,Goa,100
3,,No title here,Culture,Delhi,500
4,Desert Safari,,Adventure,Rajasthan,800
5,Backwater Cruise,Houseboat stay,Nature,Kerala,9999.50
";

    #[test]
    fn test_parse_filters_and_dedupes() {
        let items = parse_catalog(SAMPLE.as_bytes()).unwrap();
        let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "5"]);
        assert_eq!(items[0].title, "Beach Paradise");
        assert_eq!(items[1].price, 22500);
        assert_eq!(items[2].price, 9999);
    }

    #[test]
    fn test_missing_columns_is_load_error() {
        let csv = "id,title,description\n1,a,b\n";
        let err = parse_catalog(csv.as_bytes()).unwrap_err();
        match err {
            CatalogError::Load(msg) => {
                assert!(msg.contains("category"));
                assert!(msg.contains("budget"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_column_order_does_not_matter() {
        let csv = "budget,location,category,description,title,id\n700,Goa,Nature,Birds,Bird Walk,b1\n";
        let items = parse_catalog(csv.as_bytes()).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "b1");
        assert_eq!(items[0].location, "Goa");
        assert_eq!(items[0].price, 700);
    }

    #[test]
    fn test_parse_price() {
        assert_eq!(parse_price("15000"), Some(15000));
        assert_eq!(parse_price("₹15,000"), Some(15000));
        assert_eq!(parse_price("Rs. 1200.75"), Some(1200));
        assert_eq!(parse_price("free"), None);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let items = load_catalog_csv(file.path()).unwrap();
        assert_eq!(items.len(), 3);
    }

    #[test]
    fn test_load_missing_file() {
        let result = load_catalog_csv(Path::new("/nonexistent/catalog.csv"));
        assert!(matches!(result, Err(CatalogError::Load(_))));
    }
}
