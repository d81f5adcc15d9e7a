//! Raw list/get/watch requests with Table content negotiation
//!
//! kube's typed `Api` always negotiates plain object payloads, so the table
//! fetcher builds its requests by hand: the dynamic resource path plus the
//! `as=Table` Accept header and the `includeObject=Object` query parameter,
//! executed through the shared [`kube::Client`].

use futures::StreamExt;
use futures::stream::BoxStream;
use http::HeaderValue;
use http::header::ACCEPT;
use kube::Client;
use kube::api::{ApiResource, DynamicObject, GetParams, ListParams, Request, WatchParams};
use kube::core::WatchEvent;

use crate::error::Result;
use crate::table::Table;

/// Accept header requesting the Table representation with a JSON fallback
const TABLE_ACCEPT: &str = "application/json;as=Table;v=v1;g=meta.k8s.io, application/json";

/// Ask the server to embed the full object into each table row
const INCLUDE_OBJECT: &str = "includeObject=Object";

/// Issues Table-negotiated requests for resolved resource mappings.
///
/// kube's [`Client`] is group-version agnostic, so a single fetcher serves
/// every mapping; the per-call [`ApiResource`] carries the path.
#[derive(Clone)]
pub struct TableClient {
    client: Client,
}

impl TableClient {
    pub fn new(client: Client) -> Self {
        TableClient { client }
    }

    /// The underlying client, for the object-watch fallback path
    pub(crate) fn client(&self) -> Client {
        self.client.clone()
    }

    /// List a resource in Table form. `None` namespace means cluster-wide,
    /// also for namespaced resources.
    pub async fn list_table(&self, ar: &ApiResource, namespace: Option<&str>) -> Result<Table> {
        let req = request_base(ar, namespace).list(&ListParams::default())?;
        Ok(self.client.request::<Table>(negotiate(req)?).await?)
    }

    /// Get a single object in Table form (a one-row table)
    pub async fn get_table(
        &self,
        ar: &ApiResource,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<Table> {
        let req = request_base(ar, namespace).get(name, &GetParams::default())?;
        Ok(self.client.request::<Table>(negotiate(req)?).await?)
    }

    /// Open a Table-negotiated watch starting at `resource_version`
    pub async fn watch_table(
        &self,
        ar: &ApiResource,
        namespace: Option<&str>,
        resource_version: &str,
    ) -> Result<BoxStream<'static, kube::Result<WatchEvent<Table>>>> {
        let req = request_base(ar, namespace).watch(&WatchParams::default(), resource_version)?;
        let stream = self
            .client
            .request_events::<Table>(negotiate(req)?)
            .await?;
        Ok(stream.boxed())
    }
}

fn request_base(ar: &ApiResource, namespace: Option<&str>) -> Request {
    Request::new(<DynamicObject as kube::Resource>::url_path(ar, namespace))
}

/// Decorate a built request with the Table negotiation bits
fn negotiate(mut req: http::Request<Vec<u8>>) -> Result<http::Request<Vec<u8>>> {
    let uri = req.uri().to_string();
    let sep = if uri.contains('?') { '&' } else { '?' };
    *req.uri_mut() = format!("{uri}{sep}{INCLUDE_OBJECT}").parse()?;
    req.headers_mut()
        .insert(ACCEPT, HeaderValue::from_static(TABLE_ACCEPT));
    Ok(req)
}
