use service::ListingService;

/// Shared handler state; cloning is cheap, the store sits behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub listings: ListingService,
}

impl AppState {
    pub fn new(listings: ListingService) -> Self {
        Self { listings }
    }
}
