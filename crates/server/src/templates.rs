use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use rust_decimal::Decimal;
use tera::Tera;
use tracing::{info, warn};
use ubermelon_core::config::SHOP_TEMPLATES;

/// Shop pages bundled into the binary; used when the template directory is
/// missing or incomplete.
const EMBEDDED_TEMPLATES: [(&str, &str); 7] = [
    ("base.html", include_str!("../../../templates/shop/base.html")),
    ("homepage.html", include_str!("../../../templates/shop/homepage.html")),
    ("all_melons.html", include_str!("../../../templates/shop/all_melons.html")),
    ("melon_details.html", include_str!("../../../templates/shop/melon_details.html")),
    ("cart.html", include_str!("../../../templates/shop/cart.html")),
    ("login.html", include_str!("../../../templates/shop/login.html")),
    ("error.html", include_str!("../../../templates/shop/error.html")),
];

pub fn init_templates(dir: &Path) -> Result<Tera, tera::Error> {
    let pattern = format!("{}/**/*.html", dir.display());
    let mut tera = match Tera::new(&pattern) {
        Ok(tera) if has_all_pages(&tera) => {
            info!(
                event_name = "system.templates.loaded",
                correlation_id = "bootstrap",
                template_dir = %dir.display(),
                "shop templates loaded from filesystem"
            );
            tera
        }
        Ok(_) => {
            warn!(
                template_dir = %dir.display(),
                "shop template directory is incomplete, using embedded templates"
            );
            embedded_templates()?
        }
        Err(error) => {
            warn!(
                template_dir = %dir.display(),
                error = %error,
                "failed to load shop templates from filesystem, using embedded templates"
            );
            embedded_templates()?
        }
    };

    register_template_filters(&mut tera);
    Ok(tera)
}

pub fn embedded_templates() -> Result<Tera, tera::Error> {
    let mut tera = Tera::default();
    tera.add_raw_templates(EMBEDDED_TEMPLATES.to_vec())?;
    register_template_filters(&mut tera);
    Ok(tera)
}

fn has_all_pages(tera: &Tera) -> bool {
    let loaded: Vec<&str> = tera.get_template_names().collect();
    SHOP_TEMPLATES.iter().all(|name| loaded.contains(name))
}

pub fn register_template_filters(tera: &mut Tera) {
    tera.register_filter("money", tera_money_filter);
}

/// Formats an amount to 2 decimal places.
/// Usage: `melon.price | money`
///
/// Prices arrive as decimal strings (how `Decimal` serializes) or as plain
/// numbers.
fn tera_money_filter(
    value: &tera::Value,
    _args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    let amount = match value {
        tera::Value::String(raw) => Decimal::from_str(raw.trim())
            .map_err(|error| tera::Error::msg(format!("money filter got `{raw}`: {error}")))?,
        tera::Value::Number(number) => number
            .as_f64()
            .and_then(|float| Decimal::try_from(float).ok())
            .unwrap_or(Decimal::ZERO),
        tera::Value::Null => Decimal::ZERO,
        other => return Err(tera::Error::msg(format!("money filter cannot format `{other}`"))),
    };
    Ok(tera::Value::String(format!("{:.2}", amount.round_dp(2))))
}
