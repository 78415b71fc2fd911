use crate::credentials::CloudSite;

/// Picks which accessible Jira site a new session is bound to.
pub trait SiteSelector: Send + Sync {
    fn select(&self, sites: Vec<CloudSite>) -> Option<CloudSite>;
}

/// Takes the first site in the order Atlassian returns them.
///
/// Accounts with several sites always land on the first one; there is no
/// site picker.
#[derive(Debug, Default, Clone, Copy)]
pub struct FirstSite;

impl SiteSelector for FirstSite {
    fn select(&self, sites: Vec<CloudSite>) -> Option<CloudSite> {
        sites.into_iter().next()
    }
}
