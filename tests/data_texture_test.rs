use cgmath::{Matrix, Matrix4, SquareMatrix, Vector3};
use merge_ngin::{
    DataTexture, MatrixAndInvTexture, MatrixTexture, SlotWidth,
    data_texture::{decode_slot, side_for},
};

use crate::common::test_utils::{RecordingSink, matrices_approx_eq};

mod common;

#[test]
fn side_is_the_smallest_square_that_fits() {
    assert_eq!(side_for(0), 1);
    assert_eq!(side_for(1), 1);
    assert_eq!(side_for(4), 2);
    assert_eq!(side_for(5), 3);
    assert_eq!(side_for(9), 3);
    assert_eq!(side_for(10), 4);
    // 1000 instances with 8 slots
    assert_eq!(side_for(8000), 90);
}

#[test]
fn records_land_at_their_texel() {
    let mut texture = DataTexture::new("thing", 7, 3, SlotWidth::Vec4);
    assert_eq!(texture.side(), 5);
    assert!(texture.set_record(4, &[
        1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 11.0, 12.0,
    ]));

    let texels = texture.texels();
    for slot in 0..3 {
        let (x, y) = texture.texel_coords(4, slot);
        let decoded = decode_slot(&texels, texture.side(), y * texture.side() + x);
        assert_eq!(&decoded[..], texture.slot(4, slot));
    }
    assert_eq!(texture.texel_coords(4, 2), (4, 2));
}

#[test]
fn vec3_slots_are_padded_with_one() {
    let mut texture = DataTexture::new("color", 2, 2, SlotWidth::Vec3);
    assert!(texture.set_record(1, &[0.1, 0.2, 0.3, 0.4, 0.5, 0.6]));
    let texels = texture.texels();
    assert_eq!(texels.len(), 4 * 4);
    assert_eq!(decode_slot(&texels, 2, 2), [0.1, 0.2, 0.3, 1.0]);
    assert_eq!(decode_slot(&texels, 2, 3), [0.4, 0.5, 0.6, 1.0]);
    assert_eq!(decode_slot(&texels, 2, 0), [0.0, 0.0, 0.0, 1.0]);
}

#[test]
fn wrong_lengths_are_rejected_without_dirtying() {
    let mut texture = DataTexture::new("color", 2, 2, SlotWidth::Vec3);
    assert!(!texture.set_record(0, &[1.0, 2.0, 3.0]));
    assert!(!texture.set_slot(0, 0, &[1.0, 2.0, 3.0, 4.0]));
    assert!(!texture.set_slot(0, 2, &[1.0, 2.0, 3.0]));
    assert!(!texture.is_dirty());
    assert_eq!(texture.record(0), [0.0; 6]);

    assert!(texture.set_slot(1, 1, &[7.0, 8.0, 9.0]));
    assert_eq!(texture.record(1), [0.0, 0.0, 0.0, 7.0, 8.0, 9.0]);
}

#[test]
fn flush_uploads_once_per_change() {
    let mut texture = DataTexture::new("instance", 3, 2, SlotWidth::Vec3);
    let mut sink = RecordingSink::default();

    assert!(!texture.flush(&mut sink));
    texture.set_slot(2, 0, &[1.0, 0.0, 0.0]);
    texture.set_slot(0, 1, &[0.0, 0.0, 0.0]);
    assert!(texture.flush(&mut sink));
    assert!(!texture.flush(&mut sink));

    assert_eq!(sink.uploads.len(), 1);
    let (side, texels) = &sink.uploads[0];
    assert_eq!(*side, 3);
    assert_eq!(texels.len(), 3 * 3 * 4);
    assert_eq!(decode_slot(texels, 3, 4), [1.0, 0.0, 0.0, 1.0]);
}

#[test]
fn generated_wgsl_names_follow_the_texture() {
    let texture = DataTexture::new("instance_color", 4, 2, SlotWidth::Vec3);
    let wgsl = texture.wgsl(1, 3);
    assert!(wgsl.contains("@group(1) @binding(3)"));
    assert!(wgsl.contains("var instance_color_map: texture_2d<f32>;"));
    assert!(wgsl.contains("struct InstanceColorData {"));
    assert!(wgsl.contains("data1: vec3<f32>,"));
    assert!(!wgsl.contains("data2"));
    assert!(wgsl.contains("fn get_instance_color_data(record: u32) -> InstanceColorData"));
    assert!(wgsl.contains("let start = record * 2u;"));
    assert!(wgsl.contains("textureLoad(instance_color_map, vec2<u32>(index % side, index / side), 0)"));
    assert_eq!(
        texture.wgsl_fetch("c", "in.tag.x"),
        "let c = get_instance_color_data(in.tag.x);"
    );
}

#[test]
fn matrix_texture_keeps_column_major_order() {
    let mut texture = MatrixTexture::new("bone", 2);
    let matrix = Matrix4::from_translation(Vector3::new(1.0, 2.0, 3.0));
    assert!(texture.set_matrix(1, &matrix));
    assert_eq!(&texture.slot(1, 3)[..3], &[1.0, 2.0, 3.0]);
    assert!(matrices_approx_eq(&texture.matrix(1), &matrix));
    assert!(texture.wgsl(1, 0).contains("fn get_bone_matrix(record: u32) -> mat4x4<f32>"));
}

#[test]
fn matrix_and_inverse_stores_the_normal_matrix() {
    let mut texture = MatrixAndInvTexture::new("transform", 3);
    let world = Matrix4::from_translation(Vector3::new(5.0, 0.0, 0.0))
        * Matrix4::from_nonuniform_scale(2.0, 1.0, 0.5);
    assert!(texture.set_matrix(2, &world));

    let expected = world.invert().expect("invertible").transpose();
    assert!(matrices_approx_eq(&texture.matrix(2), &world));
    assert!(matrices_approx_eq(&texture.normal_matrix(2), &expected));

    let wgsl = texture.wgsl(1, 0);
    assert!(wgsl.contains("fn get_transform_matrix(record: u32)"));
    assert!(wgsl.contains("fn get_transform_normal_matrix(record: u32)"));
    assert!(wgsl.contains("data.data4, data.data5, data.data6, data.data7"));
}

#[test]
fn singular_matrix_gets_an_identity_normal_matrix() {
    let mut texture = MatrixAndInvTexture::new("transform", 1);
    let flat = Matrix4::from_nonuniform_scale(1.0, 0.0, 1.0);
    assert!(texture.set_matrix(0, &flat));
    assert!(matrices_approx_eq(&texture.normal_matrix(0), &Matrix4::identity()));
}

#[test]
fn matrices_read_back_bit_exact_through_the_texel_layout() {
    let mut texture = MatrixTexture::new("bone", 3);
    let matrix = Matrix4::from_translation(Vector3::new(-3.25, 0.1, 7.0))
        * Matrix4::from_angle_y(cgmath::Deg(33.0))
        * Matrix4::from_nonuniform_scale(1.5, 0.3, 2.0);
    assert!(texture.set_matrix(2, &matrix));

    let columns: [[f32; 4]; 4] = matrix.into();
    let texels = texture.texels();
    let side = texture.side();
    for (slot, column) in columns.iter().enumerate() {
        let (x, y) = texture.texel_coords(2, slot as u32);
        assert_eq!(decode_slot(&texels, side, y * side + x), *column);
    }
}

#[test]
fn padding_texels_are_not_records() {
    // 3 records of one slot in a 2x2 texture
    let mut texture = DataTexture::new("thing", 3, 1, SlotWidth::Vec4);
    assert!(texture.set_record(2, &[1.0, 2.0, 3.0, 4.0]));
    let texels = texture.texels();
    assert_eq!(texels.len(), 2 * 2 * 4);
    assert_eq!(decode_slot(&texels, 2, 2), [1.0, 2.0, 3.0, 4.0]);
    assert_eq!(decode_slot(&texels, 2, 3), [0.0; 4]);

    let vec3 = DataTexture::new("color", 3, 1, SlotWidth::Vec3);
    assert_eq!(decode_slot(&vec3.texels(), 2, 3), [0.0, 0.0, 0.0, 1.0]);
}

#[test]
#[should_panic]
fn writing_past_the_record_count_panics() {
    let mut texture = DataTexture::new("thing", 3, 1, SlotWidth::Vec4);
    texture.set_record(3, &[1.0, 2.0, 3.0, 4.0]);
}
