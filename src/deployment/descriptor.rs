//! Deployment from a validated descriptor.

use crate::builtin;
use crate::config::schema::{AppConfig, ErrorPageConfig};
use crate::deployment::{Deployment, DeploymentError, FragmentContribution};
use crate::dispatch::ErrorPages;

/// Build the deployment a descriptor describes.
///
/// Application filters are registered before fragment filters. Application
/// mappings are registered after fragment mappings, so they override them.
pub fn build_deployment(config: &AppConfig) -> Result<Deployment, DeploymentError> {
    let mut builder = Deployment::builder(config.name.as_str())
        .settings(config.dispatch)
        .reject_duplicate_mappings(config.reject_duplicate_mappings)
        .error_pages(error_pages(&config.error_pages));

    for handler in &config.handlers {
        builder.add_handler(handler.name.as_str(), builtin::handler(&handler.name, &handler.kind)?)?;
    }
    for filter in &config.filters {
        builder.add_filter(filter.name.as_str(), builtin::filter(&filter.name, &filter.kind)?)?;
    }

    for filter in &config.filters {
        builder.register_filter(filter.entry())?;
    }

    if !config.fragments.is_empty() {
        let contributions = config
            .fragments
            .iter()
            .map(|f| FragmentContribution {
                fragment: f.fragment(),
                mappings: f
                    .mappings
                    .iter()
                    .map(|m| (m.pattern.clone(), m.handler.clone()))
                    .collect(),
                filters: f.filters.iter().map(|c| c.entry()).collect(),
            })
            .collect();
        let applied = builder.register_fragments(contributions, config.absolute_ordering.as_deref())?;

        // Only applied fragments bring their implementations along.
        for fragment in config.fragments.iter().filter(|f| applied.contains(&f.name)) {
            for handler in &fragment.handlers {
                builder.add_handler(handler.name.as_str(), builtin::handler(&handler.name, &handler.kind)?)?;
            }
            for filter in &fragment.filters {
                builder.add_filter(filter.name.as_str(), builtin::filter(&filter.name, &filter.kind)?)?;
            }
        }
    }

    for mapping in &config.mappings {
        builder.register_mapping(&mapping.pattern, &mapping.handler)?;
    }

    builder.build()
}

fn error_pages(configs: &[ErrorPageConfig]) -> ErrorPages {
    configs.iter().fold(ErrorPages::new(), |pages, page| {
        match (page.status, &page.failure_type) {
            (Some(status), _) => pages.status(status, page.path.as_str()),
            (None, Some(failure_type)) => pages.failure_type(failure_type.as_str(), page.path.as_str()),
            (None, None) => pages.default_path(page.path.as_str()),
        }
    })
}
