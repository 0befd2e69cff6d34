use brazier::*;
use std::rc::Rc;

fn lit_material(ctx: &RenderContext, program: &Rc<ShaderProgram>, color: Vec4) -> Rc<Material> {
    let material = Material::new(ctx, Rc::clone(program));
    material.set_vec4("u_Color", color);
    material.set_float("u_Shininess", 32.0);
    Rc::new(material)
}

fn place(material: Rc<Material>, mesh: Mesh, position: Vec3) -> SharedDrawable {
    Drawable::mesh3d(Some(material), vec![Rc::new(mesh)])
        .with_transform(Transform::from_position(position))
        .shared()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::new()
        .title("Brazier")
        .size(1280, 720)
        .clear_color(Color::rgb(0.08, 0.08, 0.1));

    run_with_config(config, |ctx| {
        let lit = Rc::new(ShaderProgram::lit(ctx));
        let unlit = Rc::new(ShaderProgram::unlit(ctx));

        let mut scene = Scene::new(ctx);
        scene.clear_color = Color::rgb(0.08, 0.08, 0.1);
        scene.ambient_color = Vec3::splat(0.15);
        *scene.directional_light_mut() =
            DirectionalLight::new(Vec3::new(1.0, 0.95, 0.9)).rotated(Vec3::new(-50.0, 30.0, 0.0));

        let grid_material = Rc::new(Material::new(ctx, unlit));
        grid_material.set_vec4("u_Color", Vec4::new(0.35, 0.35, 0.4, 1.0));
        let grid = Rc::new(Mesh::grid(ctx, 20.0, 20.0, 20, 20));
        scene.add_drawable(&Drawable::mesh3d(Some(grid_material), vec![grid]).shared());

        let red = lit_material(ctx, &lit, Vec4::new(0.85, 0.25, 0.2, 1.0));
        let green = lit_material(ctx, &lit, Vec4::new(0.3, 0.8, 0.35, 1.0));
        let blue = lit_material(ctx, &lit, Vec4::new(0.25, 0.4, 0.9, 1.0));
        let gold = lit_material(ctx, &lit, Vec4::new(0.9, 0.75, 0.3, 1.0));

        let spinner = place(Rc::clone(&red), Mesh::cube(ctx, 1.0), Vec3::new(-4.5, 0.5, 0.0));
        let drawables = [
            Rc::clone(&spinner),
            place(green, Mesh::sphere(ctx, 0.6, 32, 16), Vec3::new(-1.5, 0.6, 0.0)),
            place(blue, Mesh::cylinder(ctx, 0.5, 1.2, 24), Vec3::new(1.5, 0.6, 0.0)),
            place(Rc::clone(&gold), Mesh::cone(ctx, 0.6, 1.2, 24), Vec3::new(4.5, 0.6, 0.0)),
            place(gold, Mesh::rectangular_prism(ctx, 3.0, 0.4, 1.0), Vec3::new(0.0, 0.2, 3.0)),
            place(red, Mesh::plane_square(ctx, 2.0), Vec3::new(0.0, 0.01, -3.0)),
        ];
        for drawable in &drawables {
            scene.add_drawable(drawable);
        }
        log::info!(
            "scene ready: {} drawables, {} programs",
            scene.len(),
            scene.programs().len()
        );

        let mut camera = Camera::perspective(1.0, 60.0)
            .at(Vec3::new(0.0, 6.0, 10.0))
            .rotated(Vec3::new(-30.0, 0.0, 0.0));

        move |frame| {
            camera.aspect = frame.aspect();
            if let Some(transform) = spinner.borrow_mut().transform_mut() {
                transform.rotation.y += 60.0 * frame.dt;
                transform.rotation.x += 25.0 * frame.dt;
            }
            scene.draw(&camera, None);
        }
    })?;
    Ok(())
}
