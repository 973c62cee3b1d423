use std::path::PathBuf;
use std::process;

use ghs_tools::texture::TextureCache;
use ghs_tools::{decode_file, ContainerKind};

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage:");
        eprintln!("  ghs_inspect <file.ghs|file.pm2|file.map> [--textures <dir>]");
        eprintln!();
        eprintln!("Prints a JSON summary of the decoded container to stdout.");
        process::exit(1);
    }

    let path = PathBuf::from(&args[1]);
    let texture_dir = match args.iter().position(|a| a == "--textures") {
        Some(index) => match args.get(index + 1) {
            Some(dir) => Some(PathBuf::from(dir)),
            None => {
                eprintln!("--textures requires a directory argument");
                process::exit(1);
            }
        },
        None => None,
    };

    let bundle = match decode_file(&path) {
        Ok(bundle) => bundle,
        Err(err) => {
            eprintln!("Decode failed: {:?}", err);
            process::exit(1);
        }
    };

    let textures = match texture_dir {
        Some(dir) => match TextureCache::scan(&dir) {
            Ok(cache) => bundle.resolve_textures(&cache),
            Err(err) => {
                eprintln!("Texture scan failed: {}", err);
                process::exit(1);
            }
        },
        None => vec![None; bundle.parts.len()],
    };

    let kind = match bundle.kind {
        ContainerKind::Ghs => "ghs",
        ContainerKind::MapPm2 => "map-pm2",
        ContainerKind::Pm2 => "pm2",
    };

    let parts: Vec<_> = bundle
        .parts
        .iter()
        .zip(&textures)
        .map(|(part, texture)| {
            serde_json::json!({
                "name": part.name,
                "vertices": part.mesh.vertex_count(),
                "triangles": part.mesh.triangle_count(),
                "shape_keys": part.mesh.shape_keys.iter().map(|k| &k.name).collect::<Vec<_>>(),
                "texture_hint": part.mesh.texture.as_ref().map(|t| t.hint()),
                "texture_path": texture.as_ref().map(|p| p.display().to_string()),
                "attach_bone": part.attach_bone,
                "placed": part.placement.is_some(),
            })
        })
        .collect();

    let clips: Vec<_> = bundle
        .clips
        .iter()
        .map(|clip| {
            serde_json::json!({
                "frame_rate": clip.frame_rate,
                "channels": clip.channels.len(),
                "duration": clip.duration(),
            })
        })
        .collect();

    let summary = serde_json::json!({
        "file": path.display().to_string(),
        "kind": kind,
        "parts": parts,
        "bones": bundle.skeleton.as_ref().map_or(0, |s| s.len()),
        "clips": clips,
        "warnings": bundle.warnings,
    });

    match serde_json::to_string_pretty(&summary) {
        Ok(text) => println!("{}", text),
        Err(err) => {
            eprintln!("Summary serialization failed: {}", err);
            process::exit(1);
        }
    }
}
