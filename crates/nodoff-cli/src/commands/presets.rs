use nodoff_core::Config;
use serde::Serialize;

#[derive(Serialize)]
struct Preset {
    selection: nodoff_core::TimerSelection,
    label: String,
}

pub fn run(json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_or_default();
    let presets: Vec<Preset> = config
        .presets()
        .into_iter()
        .map(|selection| Preset {
            selection,
            label: selection.to_string(),
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&presets)?);
    } else {
        for preset in &presets {
            println!("{}", preset.label);
        }
    }
    Ok(())
}
