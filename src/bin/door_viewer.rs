use door_viewer::ViewerConfig;

const HELP: &str = "\
door-viewer

USAGE:
  door-viewer [OPTIONS] [ASSET]...

OPTIONS:
  --color HEX        Tint the model, e.g. #8b5a2b
  --asset-root DIR   Directory assets are resolved against [default: assets]
  --frames N         Unmount after N rendered frames
  --autoplay CLIP    Play an animation once the model is loaded
  -h, --help         Print this help

ARGS:
  [ASSET]...         Model files below the asset root, one window each
                     [default: models/door.glb]
";

fn parse_args(mut args: pico_args::Arguments) -> anyhow::Result<Option<Vec<ViewerConfig>>> {
    if args.contains(["-h", "--help"]) {
        return Ok(None);
    }
    let color: Option<String> = args.opt_value_from_str("--color")?;
    let asset_root: Option<String> = args.opt_value_from_str("--asset-root")?;
    let frames: Option<u64> = args.opt_value_from_str("--frames")?;
    let autoplay: Option<String> = args.opt_value_from_str("--autoplay")?;

    let mut assets: Vec<String> = args
        .finish()
        .into_iter()
        .map(|arg| {
            arg.into_string()
                .map_err(|arg| anyhow::anyhow!("asset path {arg:?} is not valid UTF-8"))
        })
        .collect::<anyhow::Result<_>>()?;
    if assets.is_empty() {
        assets.push(ViewerConfig::default().asset_path);
    }

    let configs = assets
        .into_iter()
        .enumerate()
        .map(|(idx, asset)| {
            let mut config = ViewerConfig::new(asset);
            if idx > 0 {
                config.title = format!("{} ({})", config.title, idx + 1);
            }
            if let Some(color) = &color {
                config = config.with_hex_color(color)?;
            }
            if let Some(root) = &asset_root {
                config = config.with_asset_root(root.clone());
            }
            if let Some(frames) = frames {
                config = config.with_max_frames(frames);
            }
            if let Some(clip) = &autoplay {
                config = config.with_autoplay(clip.clone());
            }
            Ok(config)
        })
        .collect::<anyhow::Result<_>>()?;
    Ok(Some(configs))
}

fn main() -> anyhow::Result<()> {
    match parse_args(pico_args::Arguments::from_env())? {
        Some(configs) => door_viewer::run(configs),
        None => {
            print!("{HELP}");
            Ok(())
        }
    }
}
