pub mod geom;
pub mod renderer;
pub mod scene;
pub mod settings;

pub fn init_logging() {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .try_init();
}
