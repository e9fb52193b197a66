use anyhow::Context;
use rust_decimal::Decimal;
use serde::Serialize;
use ubermelon_core::config::{AppConfig, LoadOptions};
use ubermelon_core::shop::catalog::Catalog;

use super::CommandResult;

#[derive(Debug, Serialize)]
struct CatalogEntry<'a> {
    id: u32,
    common_name: &'a str,
    melon_type: &'a str,
    price: Decimal,
    seedless: bool,
}

pub fn run(json_output: bool) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure("catalog", "config_validation", error.to_string(), 2)
        }
    };

    let catalog = match load(&config) {
        Ok(catalog) => catalog,
        Err(error) => return CommandResult::failure("catalog", "catalog_load", format!("{error:#}"), 3),
    };

    if json_output {
        return match serde_json::to_string_pretty(&entries(&catalog)) {
            Ok(output) => CommandResult { exit_code: 0, output },
            Err(error) => CommandResult::failure("catalog", "serialization", error.to_string(), 4),
        };
    }

    CommandResult { exit_code: 0, output: render_table(&catalog) }
}

fn load(config: &AppConfig) -> anyhow::Result<Catalog> {
    let path = config.catalog.path.as_deref();
    Catalog::load_or_builtin(path).with_context(|| match path {
        Some(path) => format!("loading catalog from `{}`", path.display()),
        None => "loading builtin catalog".to_string(),
    })
}

fn entries(catalog: &Catalog) -> Vec<CatalogEntry<'_>> {
    catalog
        .list_all()
        .iter()
        .map(|melon| CatalogEntry {
            id: melon.id.0,
            common_name: &melon.common_name,
            melon_type: &melon.melon_type,
            price: melon.price,
            seedless: melon.seedless,
        })
        .collect()
}

fn render_table(catalog: &Catalog) -> String {
    let mut lines = vec![format!("{} melons:", catalog.len())];
    for melon in catalog.list_all() {
        lines.push(format!(
            "- [{}] {} ({}) {}",
            melon.id,
            melon.common_name,
            melon.melon_type,
            melon.price_str()
        ));
    }
    lines.join("\n")
}
