//! Sentry helpers shared by the façade and reconciler.

/// Add a breadcrumb for a cart action.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of cart
/// actions leading up to an error. Without an initialized Sentry client this
/// is a no-op.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added to guest cart", &[("store_id", store_id.to_string())]);
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: &[(&str, String)]) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    for (key, value) in data {
        breadcrumb
            .data
            .insert((*key).to_string(), serde_json::Value::String(value.clone()));
    }

    sentry::add_breadcrumb(breadcrumb);
}

/// Report a failed authenticated cart operation to Sentry.
///
/// Backend rejections (validation, stock) are expected and only logged;
/// transport and decoding failures are captured.
pub fn capture_api_error(error: &crate::api::ApiError) {
    if matches!(error, crate::api::ApiError::Rejected { .. }) {
        return;
    }
    let event_id = sentry::capture_error(error);
    tracing::error!(error = %error, sentry_event_id = %event_id, "Cart API failure");
}
