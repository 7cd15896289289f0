use std::sync::Arc;

use pingora::server::{configuration::Opt, Server};

use company_admin::{
    action::CompanyBranchCreateAction,
    admin::{AdminContext, AdminHttpApp},
    branch::{
        service::StoreBranchService,
        store::{BranchStore, EtcdBranchStore, MemoryBranchStore},
        Company,
    },
    config::{etcd::EtcdClientWrapper, Config, StorageType},
    logging::{DefaultLogService, Logger},
};

fn main() {
    // Read command-line arguments
    let opt = Opt::parse_args();

    // Load configuration with optional override
    let config = Config::load_yaml_with_opt_override(&opt).expect("Failed to load configuration");

    // Initialize logging
    let logger = config.log.clone().map(Logger::new);
    match &logger {
        Some(logger) => logger.init_env_logger(),
        None => env_logger::init(),
    }

    log::info!("Building branch store...");
    let store: Arc<dyn BranchStore> = match config.storage {
        StorageType::Memory => Arc::new(MemoryBranchStore::new()),
        StorageType::Etcd => {
            let etcd = config
                .etcd
                .clone()
                .expect("etcd config is validated for etcd storage");
            Arc::new(EtcdBranchStore::new(EtcdClientWrapper::new(etcd)))
        }
    };

    let create_action = CompanyBranchCreateAction::new(
        Arc::new(StoreBranchService::new(store.clone())),
        Arc::new(DefaultLogService),
    );
    let companies: Vec<Company> = config.companies.iter().map(Company::from).collect();
    log::info!("Loaded {} companies", companies.len());
    let ctx = AdminContext::new(store, create_action, companies);

    let mut server = Server::new_with_opt_and_conf(Some(opt), config.pingora);

    log::info!("Bootstrapping...");
    server.bootstrap();

    if let Some(logger) = logger {
        server.add_service(logger);
    }

    log::info!("Adding admin service on {}...", config.admin.address);
    server.add_service(AdminHttpApp::admin_http_service(config.admin, ctx));

    log::info!("Starting Server...");
    server.run_forever();
}
