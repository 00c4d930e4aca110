use image::Rgba;

use slop::canvas::{Layer, LayerStack};
use slop::compositor::flatten;
use slop::draw::{self, StampPolicy};
use slop::history::HistoryManager;
use slop::selection::{self, Pointer};
use slop::settings::EditorSettings;
use slop::{io, EditorError, PixelSurface, Project};

const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);

#[test]
fn red_dot_on_white_flattens_exactly() {
    let mut layer = Layer::filled(4, 4, WHITE).unwrap();
    draw::stamp(&mut layer.surface, 1, 1, 0, RED, StampPolicy::Overwrite).unwrap();
    let stack = LayerStack::new(layer);

    let flat = flatten(stack.layers()).unwrap();
    for y in 0..4 {
        for x in 0..4 {
            let expect = if (x, y) == (1, 1) { RED.0 } else { WHITE.0 };
            assert_eq!(flat.pixel(x, y), expect, "({x},{y})");
        }
    }
}

#[test]
fn removing_twice_keeps_one_layer() {
    let settings = EditorSettings { new_layer_width: 4, new_layer_height: 4, ..Default::default() };
    let mut project = Project::from_layers(LayerStack::new(Layer::filled(4, 4, WHITE).unwrap()), settings);
    project.add_layer().unwrap();
    assert_eq!(project.layers().len(), 2);

    project.remove_layer().unwrap();
    assert!(matches!(project.remove_layer(), Err(EditorError::LastLayer)));
    assert_eq!(project.layers().len(), 1);
    assert!(project.warning().is_some());
}

#[test]
fn two_layer_stack_survives_serialization() {
    let a = PixelSurface::from_raw(2, 2, (0..16).collect()).unwrap();
    let b = PixelSurface::from_raw(2, 2, (16..32).rev().collect()).unwrap();
    let mut top = Layer::new(b);
    top.enabled = false;
    let stack = LayerStack::from_layers(vec![Layer::new(a), top]).unwrap();

    let mut bytes = Vec::new();
    io::encode(&stack, &mut bytes).unwrap();
    let back = io::decode(&bytes[..]).unwrap();

    assert_eq!(back.len(), 2);
    for (orig, read) in stack.iter().zip(back.iter()) {
        assert_eq!(orig.enabled, read.enabled);
        assert_eq!(orig.surface.dimensions(), read.surface.dimensions());
        assert_eq!(orig.surface.as_raw(), read.surface.as_raw());
    }
}

#[test]
fn extracted_region_reinserts_exactly() {
    let surface = PixelSurface::random(9, 7).unwrap();
    let cut = selection::extract(&surface, 2, 1, 7, 6).unwrap();
    let mut blank = PixelSurface::transparent(9, 7).unwrap();
    selection::insert(&cut, &mut blank, 0, 0, true).unwrap();
    for y in 0..5 {
        for x in 0..5 {
            assert_eq!(blank.pixel(x, y), surface.pixel(x + 2, y + 1));
        }
    }
}

#[test]
fn history_floor_holds_after_many_undos() {
    let root = LayerStack::new(Layer::filled(3, 3, RED).unwrap());
    let mut history = HistoryManager::default();
    history.snapshot(&root);

    let mut live = LayerStack::new(Layer::filled(5, 5, WHITE).unwrap());
    for _ in 0..10 {
        history.undo(&mut live);
        assert_eq!(live, root);
    }
}

#[test]
fn session_save_load_export_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let settings = EditorSettings {
        new_layer_width: 6,
        new_layer_height: 6,
        new_layer_fill: Rgba([0, 0, 0, 0]),
        ..Default::default()
    };
    let mut project = Project::from_layers(LayerStack::new(Layer::filled(6, 6, WHITE).unwrap()), settings.clone());
    project.add_layer().unwrap();
    project.set_brush_color(RED);
    project.set_brush_radius(1);
    project.pointer_down(Pointer::at(3, 3)).unwrap();
    project.pointer_up().unwrap();

    let doc = dir.path().join("scene.slop");
    project.save(&doc).unwrap();
    let png = dir.path().join("scene.png");
    project.export_png(&png).unwrap();

    let reopened = Project::open(&doc, settings).unwrap();
    assert_eq!(reopened.layers(), project.layers());
    assert_eq!(reopened.history().len(), 1);
    assert_eq!(reopened.name, "scene.slop");

    let flat = io::import_image(&png).unwrap();
    assert_eq!(flat.pixel(3, 3), Some(RED));
    assert_eq!(flat.pixel(0, 0), Some(WHITE));
    // the stroke went to the transparent top layer, not the white base
    assert_eq!(project.layers().get(0).unwrap().surface.pixel(3, 3), Some(WHITE));
}
