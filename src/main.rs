use handsign::{
    annotate::{Annotator, AnnotatorStyle},
    config::Config,
    gui::Display,
    hand::{network::LandmarkNetwork, palm::PalmDetector},
    pipeline::Pipeline,
    webcam::Webcam,
};

fn main() -> anyhow::Result<()> {
    handsign::init_logger!();

    let config = Config::from_env()?;
    log::debug!("{config:?}");

    let webcam = Webcam::open(config.webcam_options())?;
    let mut network = LandmarkNetwork::load(&config.model, config.detector)?;
    match &config.palm_model {
        Some(path) => network = network.with_palm_detector(PalmDetector::load(path)?),
        None => log::warn!("no palm detection model given, only tracking one hand"),
    }
    let annotator = Annotator::new(AnnotatorStyle::default(), config.labels);

    let mut pipeline = Pipeline::new(webcam, network, Display::new("handsign"), annotator)
        .mirror(config.mirror);
    pipeline.run(&mut std::io::stdout().lock())?;

    log::info!("exiting after {} frames", pipeline.clock().frames());
    Ok(())
}
