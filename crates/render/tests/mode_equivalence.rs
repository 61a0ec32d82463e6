use glam::{Mat3, Vec3};
use spinfield_common::{Capabilities, GenerationParams, PlayerState, TransformMode, WorldState};
use spinfield_instances::{InstanceModel, InstanceStack, spin_transform};
use spinfield_render::{
    Camera, Command, GraphicsBackend, HeadlessBackend, RenderDispatch, RenderError, StepMode,
    UniformValue, cube_mesh, names,
};

fn caps(mode: TransformMode, lighting: bool) -> Capabilities {
    Capabilities { mode, lighting }
}

fn stack(n: u32) -> InstanceStack {
    InstanceStack::generate(n, &GenerationParams::default(), 11)
}

fn setup(
    backend: &mut HeadlessBackend,
    model: &InstanceModel,
    capabilities: Capabilities,
) -> Result<RenderDispatch, RenderError> {
    RenderDispatch::setup(backend, &cube_mesh(), model, capabilities, Camera::default())
}

fn floats(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

#[test]
fn host_upload_matches_device_reconstruction() {
    let angle = 2.75;
    let world = WorldState { angle };
    let player = PlayerState::default();

    let mut host_model = InstanceModel::new(stack(300), TransformMode::HostComputed);
    let mut host = HeadlessBackend::new();
    let mut host_dispatch =
        setup(&mut host, &host_model, caps(TransformMode::HostComputed, true)).unwrap();
    host_model.update(angle);
    host_dispatch
        .draw_frame(&mut host, &host_model, &player, &world, (800.0, 600.0))
        .unwrap();

    let device_model = InstanceModel::new(stack(300), TransformMode::DeviceComputed);
    let mut device = HeadlessBackend::new();
    let mut device_dispatch =
        setup(&mut device, &device_model, caps(TransformMode::DeviceComputed, true)).unwrap();
    device_dispatch
        .draw_frame(&mut device, &device_model, &player, &world, (800.0, 600.0))
        .unwrap();

    let uploaded = floats(host.attribute_data(names::TRANSFORM).unwrap());
    let spins = floats(device.attribute_data(names::SPIN_RATE).unwrap());
    let scales = floats(device.attribute_data(names::BASE_SCALE).unwrap());
    let Some(UniformValue::Float(theta)) = device.uniform(names::THETA) else {
        panic!("theta uniform not written");
    };
    assert_eq!(theta, angle);

    for (i, cols) in uploaded.chunks_exact(9).enumerate() {
        let from_host = Mat3::from_cols_slice(cols);
        let on_device = spin_transform(scales[i], spins[i], theta);
        assert!(
            from_host.abs_diff_eq(on_device, 1e-5),
            "instance {i}: {from_host:?} vs {on_device:?}"
        );
    }
}

#[test]
fn per_draw_mode_binds_one_transform_per_call() {
    let model = InstanceModel::new(stack(4), TransformMode::PerDraw);
    let mut backend = HeadlessBackend::new().with_command_log();
    let mut dispatch = setup(&mut backend, &model, caps(TransformMode::PerDraw, false)).unwrap();
    backend.clear_commands();

    let world = WorldState { angle: 0.4 };
    let stats = dispatch
        .draw_frame(&mut backend, &model, &PlayerState::default(), &world, (640.0, 480.0))
        .unwrap();
    assert_eq!(stats.draw_calls, 4);
    assert_eq!(stats.bytes_uploaded, 0);

    let transforms: Vec<Mat3> = backend
        .commands()
        .iter()
        .filter_map(|c| match c {
            Command::SetUniform {
                name: names::TRANSFORM,
                value: UniformValue::Mat3(m),
            } => Some(*m),
            _ => None,
        })
        .collect();
    assert_eq!(transforms.len(), 4);
    for ((_, r), t) in model.stack().iter().zip(&transforms) {
        assert!(t.abs_diff_eq(spin_transform(r.base_scale, r.spin_rate, 0.4), 1e-6));
    }
    let draws = backend
        .commands()
        .iter()
        .filter(|c| matches!(c, Command::Draw { vertices: 36 }))
        .count();
    assert_eq!(draws, 4);
}

#[test]
fn host_mode_uploads_every_frame_device_mode_never() {
    let n = 1_000;
    let mut host_model = InstanceModel::new(stack(n), TransformMode::HostComputed);
    let mut host = HeadlessBackend::new();
    let mut host_dispatch =
        setup(&mut host, &host_model, caps(TransformMode::HostComputed, false)).unwrap();

    let device_model = InstanceModel::new(stack(n), TransformMode::DeviceComputed);
    let mut device = HeadlessBackend::new();
    let mut device_dispatch =
        setup(&mut device, &device_model, caps(TransformMode::DeviceComputed, false)).unwrap();

    let player = PlayerState::default();
    for frame in 0..3 {
        let world = WorldState {
            angle: frame as f32 * 0.1,
        };
        host_model.update(world.angle);
        let h = host_dispatch
            .draw_frame(&mut host, &host_model, &player, &world, (100.0, 100.0))
            .unwrap();
        let d = device_dispatch
            .draw_frame(&mut device, &device_model, &player, &world, (100.0, 100.0))
            .unwrap();
        assert_eq!(h.bytes_uploaded, u64::from(n) * 36);
        assert_eq!(d.bytes_uploaded, 0);
        assert_eq!(h.draw_calls, 1);
        assert_eq!(d.draw_calls, 1);
        assert_eq!(d.instances_drawn, u64::from(n));
    }
}

#[test]
fn instance_attributes_step_per_instance() {
    let model = InstanceModel::new(stack(10), TransformMode::DeviceComputed);
    let mut backend = HeadlessBackend::new();
    setup(&mut backend, &model, caps(TransformMode::DeviceComputed, true)).unwrap();
    for name in [names::OFFSET, names::COLOR, names::SPIN_RATE, names::BASE_SCALE] {
        assert_eq!(backend.binding(name).unwrap().step, StepMode::Instance, "{name}");
    }
    assert_eq!(backend.binding(names::POSITION).unwrap().step, StepMode::Vertex);
    let offsets = floats(backend.attribute_data(names::OFFSET).unwrap());
    assert_eq!(offsets.len(), 30);
    let first = model.stack().offsets()[0];
    assert_eq!(Vec3::new(offsets[0], offsets[1], offsets[2]), Vec3::from_array(first));
}

#[test]
fn instancing_without_backend_support_is_fatal() {
    let model = InstanceModel::new(stack(2), TransformMode::DeviceComputed);
    let mut backend = HeadlessBackend::new().without_instancing();
    let err = setup(&mut backend, &model, caps(TransformMode::DeviceComputed, false)).unwrap_err();
    assert!(matches!(err, RenderError::MissingCapability(_)));

    let per_draw = InstanceModel::new(stack(2), TransformMode::PerDraw);
    assert!(setup(&mut backend, &per_draw, caps(TransformMode::PerDraw, false)).is_ok());
}

#[test]
fn missing_required_location_is_fatal() {
    let model = InstanceModel::new(stack(2), TransformMode::DeviceComputed);
    let mut backend = HeadlessBackend::new().hide(names::SPIN_RATE);
    let err = setup(&mut backend, &model, caps(TransformMode::DeviceComputed, false)).unwrap_err();
    assert!(matches!(err, RenderError::MissingAttribute("spin_rate")));

    let mut backend = HeadlessBackend::new().hide(names::THETA);
    let err = setup(&mut backend, &model, caps(TransformMode::DeviceComputed, false)).unwrap_err();
    assert!(matches!(err, RenderError::MissingUniform("theta")));
}

#[test]
fn missing_light_uniform_degrades_to_unlit() {
    let model = InstanceModel::new(stack(2), TransformMode::DeviceComputed);
    let mut backend = HeadlessBackend::new().hide(names::LIGHT_REVERSE_DIRECTION);
    let mut dispatch =
        setup(&mut backend, &model, caps(TransformMode::DeviceComputed, true)).unwrap();
    assert!(!dispatch.lighting_active());
    let stats = dispatch
        .draw_frame(
            &mut backend,
            &model,
            &PlayerState::default(),
            &WorldState::default(),
            (10.0, 10.0),
        )
        .unwrap();
    // view matrix and theta only
    assert_eq!(stats.uniform_writes, 2);
}

#[test]
fn lighting_writes_normalized_direction() {
    let model = InstanceModel::new(stack(2), TransformMode::DeviceComputed);
    let mut backend = HeadlessBackend::new();
    let mut dispatch =
        setup(&mut backend, &model, caps(TransformMode::DeviceComputed, true)).unwrap();
    dispatch
        .draw_frame(
            &mut backend,
            &model,
            &PlayerState::default(),
            &WorldState::default(),
            (10.0, 10.0),
        )
        .unwrap();
    let Some(UniformValue::Vec3(light)) = backend.uniform(names::LIGHT_REVERSE_DIRECTION) else {
        panic!("light not written");
    };
    assert!((light.length() - 1.0).abs() < 1e-6);
    assert!(light.y > 0.0 && light.z < 0.0);
}

#[test]
fn mode_mismatch_is_rejected() {
    let model = InstanceModel::new(stack(2), TransformMode::HostComputed);
    let mut backend = HeadlessBackend::new();
    let err = setup(&mut backend, &model, caps(TransformMode::DeviceComputed, false)).unwrap_err();
    assert!(matches!(err, RenderError::ModeMismatch { .. }));
    assert_eq!(backend.buffer_count(), 0);
    assert!(backend.begin_frame().is_err());
}

#[test]
fn frame_failing_mid_draw_is_still_closed() {
    let model = InstanceModel::new(stack(16), TransformMode::DeviceComputed);
    let mut backend = HeadlessBackend::new().with_command_log();
    let mut dispatch =
        setup(&mut backend, &model, caps(TransformMode::DeviceComputed, true)).unwrap();

    // Instancing disappears after setup, so the draw itself fails.
    let mut backend = backend.without_instancing();
    backend.clear_commands();
    let result = dispatch.draw_frame(
        &mut backend,
        &model,
        &PlayerState::default(),
        &WorldState::default(),
        (800.0, 600.0),
    );
    assert!(matches!(
        result,
        Err(RenderError::Backend(spinfield_render::BackendError::InstancingUnsupported))
    ));
    assert_eq!(backend.commands().first(), Some(&Command::BeginFrame));
    assert_eq!(backend.commands().last(), Some(&Command::EndFrame));
    assert_eq!(backend.counters().frames, 1);
    assert_eq!(backend.counters().draw_calls, 0);
}
