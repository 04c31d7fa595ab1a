use crate::tenants::protocol::WriteRequest;
use indexmap::IndexMap;

/// Tenant of series without the tenant label.
pub const ANONYMOUS_TENANT: &str = "";

/// Groups the series of a write request by the value of `label`, removing
/// the label from every series.
///
/// Every group carries the source and metadata of the original request. A
/// request without series yields a single anonymous group so its metadata
/// still reaches the distributor.
pub fn split_by_tenant(request: WriteRequest, label: &str) -> IndexMap<String, WriteRequest> {
    let WriteRequest {
        timeseries,
        source,
        metadata,
        skip_label_name_validation,
        skip_label_count_validation,
    } = request;

    let empty_group = || WriteRequest {
        timeseries: Vec::new(),
        source,
        metadata: metadata.clone(),
        skip_label_name_validation,
        skip_label_count_validation,
    };

    let mut groups: IndexMap<String, WriteRequest> = IndexMap::new();
    if timeseries.is_empty() {
        groups.insert(ANONYMOUS_TENANT.to_owned(), empty_group());
        return groups;
    }

    for mut series in timeseries {
        let tenant = series
            .take_label(label)
            .unwrap_or_else(|| ANONYMOUS_TENANT.to_owned());
        groups
            .entry(tenant)
            .or_insert_with(&empty_group)
            .timeseries
            .push(series);
    }
    groups
}
