use tracing::{info, warn};

use crate::display;
use crate::error::PanelError;
use crate::panel::{Panel, SharedPanel};
use crate::request::ActionClient;
use crate::station::ILC_INPUT;
use crate::types::{DataReport, LookupReply};

pub const QUERY_RESULT: &str = "queryResult";
pub const ACTIVATE_BUTTON: &str = "activateButton";
pub const LOOKUP_FAILED: &str = "Lookup failed.";

/// External item lookup service
#[derive(Debug, Clone)]
pub struct LookupClient {
    service: Option<ActionClient>,
    alias: bool,
}

impl LookupClient {
    pub fn new(base_url: Option<&str>, alias: bool) -> Result<Self, PanelError> {
        let service = base_url.map(ActionClient::new).transpose()?;
        Ok(Self { service, alias })
    }

    pub async fn check(&self, query: &str) -> Result<LookupReply, PanelError> {
        let service = self
            .service
            .as_ref()
            .ok_or(PanelError::LookupUnavailable)?;

        let mut params = vec![("query", query)];
        if self.alias {
            params.push(("alias", "true"));
        }
        service.get_query("check", &params).await?.json()
    }
}

pub fn update_activate_tooltip(panel: &mut Panel, ilc: &str) {
    panel.set_title(ACTIVATE_BUTTON, format!("ILC: {}", ilc));
}

/// Resolve a scanned code to an ILC, then load whatever the station saved for it.
///
/// A failed lookup falls back to the raw query; only the saved-data fetch can fail.
pub async fn run_lookup(
    lookup: &LookupClient,
    station: &ActionClient,
    panel: &SharedPanel,
    query: &str,
) -> Result<String, PanelError> {
    let query = query.trim();
    let ilc = match lookup.check(query).await {
        Ok(reply) => {
            let ilc = reply
                .data
                .first()
                .map(|row| row.item_lookup_code.clone())
                .unwrap_or_else(|| query.to_string());
            panel.write().set_html(QUERY_RESULT, reply.table);
            ilc
        }
        Err(e) => {
            warn!("🔎 Lookup for {} failed: {}", query, e);
            panel.write().set_text(QUERY_RESULT, LOOKUP_FAILED);
            query.to_string()
        }
    };

    info!("🔎 {} -> ILC {}", query, ilc);
    {
        let mut panel = panel.write();
        update_activate_tooltip(&mut panel, &ilc);
        panel.set_value(ILC_INPUT, ilc.clone());
    }

    let report: DataReport = station.get_query("saved", &[("ilc", ilc.as_str())]).await?.json()?;
    let mut panel = panel.write();
    display::display_data(&mut panel, &report);
    display::display_photos(&mut panel, &report);
    Ok(ilc)
}
