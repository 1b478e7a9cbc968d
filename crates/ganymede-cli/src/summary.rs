use std::path::Path;

use console::Style;
use ganymede_core::decoder::sampled_size;
use ganymede_core::geometry::Rect;

struct Styles {
    title: Style,
    header: Style,
    label: Style,
    value: Style,
    method: Style,
    path: Style,
}

impl Styles {
    fn new() -> Self {
        Self {
            title: Style::new().cyan().bold(),
            header: Style::new().cyan().bold(),
            label: Style::new().dim(),
            value: Style::new().bold().white(),
            method: Style::new().green(),
            path: Style::new().underlined(),
        }
    }
}

/// What `info` reports about one image.
pub struct ImageSummary<'a> {
    pub path: &'a Path,
    pub width: u32,
    pub height: u32,
    pub decoder: &'a str,
    pub window: (u32, u32),
    pub fit_scale: f32,
    pub full_sample: u32,
    pub tiled: bool,
    pub tile_edge: u32,
    /// `(sample, columns, rows)` from the full level down to sample 1.
    pub levels: Vec<(u32, u32, u32)>,
}

fn underline(len: usize) -> String {
    "\u{2550}".repeat(len)
}

pub fn print_image_summary(info: &ImageSummary) {
    let s = Styles::new();

    println!();
    println!("  {}", s.title.apply_to("Ganymede Image"));
    println!("  {}", s.title.apply_to(underline(14)));
    println!();

    println!(
        "  {:<14}{}",
        s.label.apply_to("File"),
        s.path.apply_to(info.path.display())
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Dimensions"),
        s.value.apply_to(format!("{}x{}", info.width, info.height))
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Decoder"),
        s.method.apply_to(info.decoder)
    );
    println!();

    println!("  {}", s.header.apply_to("View"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Window"),
        s.value.apply_to(format!("{}x{}", info.window.0, info.window.1))
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Fit scale"),
        s.value.apply_to(format!("{:.4}", info.fit_scale))
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Delivery"),
        s.method
            .apply_to(if info.tiled { "tiled" } else { "single bitmap" })
    );
    println!();

    if !info.tiled {
        return;
    }

    println!("  {}", s.header.apply_to("Tile Levels"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Tile edge"),
        s.value.apply_to(format!("{} px", info.tile_edge))
    );
    for &(sample, cols, rows) in &info.levels {
        let marker = if sample == info.full_sample { " (full)" } else { "" };
        println!(
            "    {:<12}{}",
            s.label.apply_to(format!("1/{sample}")),
            s.value
                .apply_to(format!("{}x{} = {} tiles{}", cols, rows, cols * rows, marker))
        );
    }
    println!();
}

pub fn print_tile_grid(sample: u32, tile_edge: u32, tiles: &[Rect]) {
    let s = Styles::new();

    println!();
    println!(
        "  {}",
        s.title
            .apply_to(format!("Sample 1/{sample}, {tile_edge} px tiles"))
    );
    println!();
    for (i, rect) in tiles.iter().enumerate() {
        let (w, h) = sampled_size(rect, sample);
        println!(
            "    {:>5}  {}{}",
            s.label.apply_to(i),
            s.value.apply_to(format!("{:<28}", rect.to_string())),
            s.label.apply_to(format!("decodes to {w}x{h}"))
        );
    }
    println!();
}
