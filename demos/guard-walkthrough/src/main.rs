use std::sync::Arc;

use campus::campus_security::{
    AllowedRoles, AuthGuard, Dashboard, GuardHandle, GuardSettings, GuardView, Identity,
    PortalRoutes, Profile, Role, Session,
};
use campus::campus_test::{FakeProfileStore, FakeSessionProvider, RecordingNavigator};
use campus::{CampusConfig, ConfigProperties};

struct Portal {
    provider: FakeSessionProvider,
    store: FakeProfileStore,
    navigator: Arc<RecordingNavigator>,
    routes: PortalRoutes,
    settings: GuardSettings,
}

impl Portal {
    fn guard(&self, allowed: impl Into<AllowedRoles>) -> GuardHandle<FakeSessionProvider> {
        AuthGuard::new(
            Arc::new(self.provider.clone()),
            Arc::new(self.store.clone()),
            self.navigator.clone(),
            allowed,
        )
        .with_routes(self.routes.clone())
        .with_settings(self.settings.clone())
        .mount()
    }

    fn dashboard(&self) -> Dashboard<FakeSessionProvider, FakeProfileStore> {
        Dashboard::new(Arc::new(self.provider.clone()), Arc::new(self.store.clone()))
            .with_routes(self.routes.clone())
            .with_settings(self.settings.clone())
    }
}

fn render(page: &str, view: &GuardView) {
    match view {
        GuardView::Loading => println!("[{page}] loading..."),
        GuardView::Redirecting { target } => println!("[{page}] redirecting to {target}"),
        GuardView::Protected(chrome) => println!(
            "[{page}] {} | {} ({}) | controls: {:?}",
            chrome.title, chrome.display_name, chrome.role_label, chrome.controls
        ),
    }
}

#[tokio::main]
async fn main() {
    campus::init_tracing();

    // load() succeeds when the yaml files are absent; env vars still overlay.
    let config = CampusConfig::load("dev").unwrap_or_else(|err| {
        tracing::warn!(error = %err, "Falling back to built-in configuration");
        CampusConfig::empty()
    });
    for meta in GuardSettings::properties_metadata()
        .into_iter()
        .chain(PortalRoutes::properties_metadata())
    {
        tracing::debug!(
            key = %meta.full_key,
            set = config.contains_key(&meta.full_key),
            default = ?meta.default_value,
            "Portal setting"
        );
    }
    let settings = GuardSettings::from_config(&config).unwrap_or_else(|err| {
        tracing::warn!(error = %err, "Invalid guard settings, using defaults");
        GuardSettings::default()
    });
    let routes = PortalRoutes::from_config(&config).unwrap_or_else(|err| {
        tracing::warn!(error = %err, "Invalid portal routes, using defaults");
        PortalRoutes::default()
    });

    let portal = Portal {
        provider: FakeSessionProvider::new(),
        store: FakeProfileStore::new()
            .with_profile(
                Profile::new("u-admin", Role::Admin)
                    .with_full_name("Ada Lovelace")
                    .with_email("ada@school.example"),
            )
            .with_profile(Profile::new("u-parent", Role::Parent).with_email("pat@home.example")),
        navigator: Arc::new(RecordingNavigator::new()),
        routes,
        settings,
    };

    println!("=== Anonymous visitor on the admin page ===");
    let mut guard = portal.guard([Role::Admin]);
    guard.resolved().await;
    render("admin", &guard.view());
    guard.unmount().await;

    println!("=== Parent signs in on the admin page ===");
    portal
        .provider
        .set_session(Some(Session::new(Identity::new("u-parent"))));
    let mut guard = portal.guard([Role::Admin]);
    guard.resolved().await;
    render("admin", &guard.view());
    guard.unmount().await;

    println!("=== Administrator on the admin page ===");
    portal
        .provider
        .set_session(Some(Session::new(Identity::new("u-admin"))));
    let mut guard = portal.guard([Role::Admin, Role::Staff]);
    guard.resolved().await;
    render("admin", &guard.view());

    println!("=== Role revoked while the page is open ===");
    let mut observer = guard.observe();
    portal
        .store
        .update(Profile::new("u-admin", Role::Student).with_full_name("Ada Lovelace"));
    if let Err(err) = observer
        .wait_for(|state| {
            state.is_resolved() && state.profile.as_ref().map(|p| &p.role) == Some(&Role::Student)
        })
        .await
    {
        tracing::warn!(error = %err, "Guard stopped before the new role was applied");
    }
    render("admin", &guard.view());

    println!("=== Sign out ===");
    if let Err(err) = guard.sign_out().await {
        println!("sign-out failed: {}", err.public_message());
    }
    if let Err(err) = observer.wait_for(|state| state.identity.is_none()).await {
        tracing::warn!(error = %err, "Guard stopped before the sign-out was applied");
    }
    render("admin", &guard.view());
    guard.unmount().await;

    println!("=== Dashboard ===");
    portal
        .provider
        .set_session(Some(Session::new(Identity::new("u-parent"))));
    let target = portal.dashboard().redirect(&*portal.navigator).await;
    println!("[dashboard] landing on {target}");

    println!();
    println!("Navigations: {:?}", portal.navigator.calls());
}
