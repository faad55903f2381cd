//! Slide Captcha entry point
//!
//! On the web: mounts the widget into the page. Natively: renders a challenge
//! from an image file to PNGs and replays a scripted drag, for inspection.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
mod wasm_widget {
    pub fn run() {
        console_error_panic_hook::set_once();
        console_log::init_with_level(log::Level::Info).expect("Failed to init logger");

        log::info!("Slide captcha starting...");

        let config = slide_captcha::web::config_from_page();
        match slide_captcha::web::mount(config) {
            Ok(widget) => {
                // Lives for the whole page
                std::mem::forget(widget);
                log::info!("Captcha mounted");
            }
            Err(e) => log::error!("Failed to mount captcha: {}", e),
        }
    }
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn wasm_main() {
    wasm_widget::run();
}

#[cfg(not(target_arch = "wasm32"))]
fn main() -> std::process::ExitCode {
    env_logger::init();
    log::info!("Slide captcha (native) starting...");
    log::info!("The widget itself runs in the browser - use `trunk serve` for the web version");

    match native::run(std::env::args().skip(1).collect()) {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            std::process::ExitCode::FAILURE
        }
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is wasm_main, this is just to satisfy the compiler
}

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use std::path::PathBuf;

    use glam::Vec2;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    use slide_captcha::captcha::{CaptchaEvent, CaptchaInput, CaptchaState, step};
    use slide_captcha::{CaptchaConfig, CaptchaError, Result, render};

    /// `slide-captcha [IMAGE [OUT_DIR [SEED]]]`
    pub fn run(args: Vec<String>) -> Result<()> {
        let config = CaptchaConfig::default();
        let mut rng = match args.get(2).map(|s| s.parse::<u64>()) {
            Some(Ok(seed)) => Pcg32::seed_from_u64(seed),
            Some(Err(e)) => return Err(CaptchaError::Config(format!("bad seed: {}", e))),
            None => Pcg32::from_os_rng(),
        };
        let mut state = CaptchaState::new(config, &mut rng)?;
        println!("Challenge: {:?}", state.challenge);

        match args.first() {
            Some(image_path) => {
                let out_dir = PathBuf::from(args.get(1).map(String::as_str).unwrap_or("."));
                let input = match render_to_files(&state, image_path, &out_dir) {
                    Ok(()) => CaptchaInput::AssetReady,
                    Err(error) => CaptchaInput::AssetFailed { error },
                };
                step(&mut state, input);
            }
            None => step(&mut state, CaptchaInput::AssetReady),
        }

        // One miss, then a hit two pixels off
        let target = state.challenge.target_x as f32;
        for (label, left) in [("miss", target + 20.0), ("hit", target + 2.0)] {
            step(&mut state, CaptchaInput::PointerDown { pos: Vec2::ZERO });
            step(&mut state, CaptchaInput::PointerMove { pos: Vec2::new(left, 0.0) });
            step(&mut state, CaptchaInput::PointerUp);
            let events: Vec<CaptchaEvent> = state.drain_events();
            println!("{} at {:.0}: {:?}", label, left, events);
        }

        Ok(())
    }

    fn render_to_files(state: &CaptchaState, image_path: &str, out_dir: &PathBuf) -> Result<()> {
        let bytes = std::fs::read(image_path).map_err(|e| CaptchaError::AssetLoad {
            src: image_path.to_string(),
            reason: e.to_string(),
        })?;
        let source = render::decode(&bytes, image_path)?;
        let surfaces = render::compose(&source, &state.config, &state.challenge)?;

        for (name, image) in [("background.png", &surfaces.background), ("piece.png", &surfaces.piece)] {
            let path = out_dir.join(name);
            image
                .save(&path)
                .map_err(|e| CaptchaError::Render(format!("{}: {}", path.display(), e)))?;
            println!("Wrote {}", path.display());
        }
        Ok(())
    }
}
