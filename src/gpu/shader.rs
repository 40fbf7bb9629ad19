//! Shader management
//!
//! GLSL 3.30 core shader compilation and linking

use anyhow::{anyhow, Result};
use glow::HasContext;
use log::info;

/// Streamed quad vertex shader
///
/// Input:
///   a_pos: Vertex position (NDC)
///   a_uv:  Texture coordinates
const QUAD_VERTEX_SHADER: &str = r#"#version 330 core
layout(location = 0) in vec3 a_pos;
layout(location = 1) in vec2 a_uv;

out vec2 v_uv;

void main() {
    gl_Position = vec4(a_pos, 1.0);
    v_uv = a_uv;
}
"#;

/// Streamed quad fragment shader
const QUAD_FRAGMENT_SHADER: &str = r#"#version 330 core
in vec2 v_uv;

uniform sampler2D u_texture;

out vec4 frag_color;

void main() {
    frag_color = texture(u_texture, v_uv);
}
"#;

/// Text rendering vertex shader
///
/// Input:
///   a_pos: Vertex position (pixels, bottom-left origin)
///   a_uv:  Atlas texture coordinates
///   a_color: Text color (RGBA)
/// Uniform:
///   u_projection: Orthographic projection matrix
const TEXT_VERTEX_SHADER: &str = r#"#version 330 core
layout(location = 0) in vec2 a_pos;
layout(location = 1) in vec2 a_uv;
layout(location = 2) in vec4 a_color;

uniform mat4 u_projection;

out vec2 v_uv;
out vec4 v_color;

void main() {
    gl_Position = u_projection * vec4(a_pos, 0.0, 1.0);
    v_uv = a_uv;
    v_color = a_color;
}
"#;

/// Text rendering fragment shader
///
/// Sample glyph atlas R(coverage) channel and output premultiplied alpha
const TEXT_FRAGMENT_SHADER: &str = r#"#version 330 core
in vec2 v_uv;
in vec4 v_color;

uniform sampler2D u_atlas;

out vec4 frag_color;

void main() {
    float coverage = texture(u_atlas, v_uv).r;
    float final_alpha = v_color.a * coverage;
    frag_color = vec4(v_color.rgb * final_alpha, final_alpha);
}
"#;

/// Compiled quad shader program
pub struct QuadShader {
    program: glow::Program,
    pub u_texture: glow::UniformLocation,
}

impl QuadShader {
    /// Compile and link quad shader
    pub fn new(gl: &glow::Context) -> Result<Self> {
        let program = compile_program(gl, QUAD_VERTEX_SHADER, QUAD_FRAGMENT_SHADER)?;

        let u_texture = unsafe {
            gl.get_uniform_location(program, "u_texture")
                .ok_or_else(|| anyhow!("u_texture uniform not found (quad)"))?
        };

        info!("Quad shader compiled");
        Ok(Self { program, u_texture })
    }

    /// Activate shader
    pub fn bind(&self, gl: &glow::Context) {
        unsafe {
            gl.use_program(Some(self.program));
        }
    }

    /// Set texture unit
    pub fn set_texture_unit(&self, gl: &glow::Context, unit: i32) {
        unsafe {
            gl.uniform_1_i32(Some(&self.u_texture), unit);
        }
    }

    /// Release resources
    pub fn destroy(&self, gl: &glow::Context) {
        unsafe {
            gl.delete_program(self.program);
        }
    }
}

/// Compiled text shader program
pub struct TextShader {
    program: glow::Program,
    pub u_projection: glow::UniformLocation,
    pub u_atlas: glow::UniformLocation,
}

impl TextShader {
    /// Compile and link text rendering shader
    pub fn new(gl: &glow::Context) -> Result<Self> {
        let program = compile_program(gl, TEXT_VERTEX_SHADER, TEXT_FRAGMENT_SHADER)?;

        let u_projection = unsafe {
            gl.get_uniform_location(program, "u_projection")
                .ok_or_else(|| anyhow!("u_projection uniform not found"))?
        };
        let u_atlas = unsafe {
            gl.get_uniform_location(program, "u_atlas")
                .ok_or_else(|| anyhow!("u_atlas uniform not found"))?
        };

        info!("Text shader compiled");
        Ok(Self {
            program,
            u_projection,
            u_atlas,
        })
    }

    /// Activate the shader
    pub fn bind(&self, gl: &glow::Context) {
        unsafe {
            gl.use_program(Some(self.program));
        }
    }

    /// Set orthographic projection matrix
    pub fn set_projection(&self, gl: &glow::Context, matrix: &[f32; 16]) {
        unsafe {
            gl.uniform_matrix_4_f32_slice(Some(&self.u_projection), false, matrix);
        }
    }

    /// Set atlas texture unit
    pub fn set_atlas_unit(&self, gl: &glow::Context, unit: i32) {
        unsafe {
            gl.uniform_1_i32(Some(&self.u_atlas), unit);
        }
    }

    /// Release resources
    pub fn destroy(&self, gl: &glow::Context) {
        unsafe {
            gl.delete_program(self.program);
        }
    }
}

/// Generate orthographic projection matrix
///
/// Maps (left, bottom)-(right, top) to NDC (-1,-1)-(1,1), z in [-1, 1].
/// Pass bottom = 0, top = height for a bottom-left pixel origin.
pub fn ortho(left: f32, right: f32, bottom: f32, top: f32) -> [f32; 16] {
    let (l, r, b, t) = (left, right, bottom, top);
    let n = -1.0_f32;
    let f = 1.0_f32;

    // Column-major (OpenGL convention)
    [
        2.0 / (r - l),
        0.0,
        0.0,
        0.0,
        0.0,
        2.0 / (t - b),
        0.0,
        0.0,
        0.0,
        0.0,
        -2.0 / (f - n),
        0.0,
        -(r + l) / (r - l),
        -(t + b) / (t - b),
        -(f + n) / (f - n),
        1.0,
    ]
}

/// Compile shader and link program
fn compile_program(
    gl: &glow::Context,
    vertex_src: &str,
    fragment_src: &str,
) -> Result<glow::Program> {
    unsafe {
        let vs = compile_shader(gl, glow::VERTEX_SHADER, vertex_src)?;
        let fs = match compile_shader(gl, glow::FRAGMENT_SHADER, fragment_src) {
            Ok(fs) => fs,
            Err(e) => {
                gl.delete_shader(vs);
                return Err(e);
            }
        };

        let program = gl
            .create_program()
            .map_err(|e| anyhow!("Failed to create program: {}", e))?;

        gl.attach_shader(program, vs);
        gl.attach_shader(program, fs);
        gl.link_program(program);

        if !gl.get_program_link_status(program) {
            let log = gl.get_program_info_log(program);
            gl.delete_program(program);
            gl.delete_shader(vs);
            gl.delete_shader(fs);
            return Err(anyhow!("Shader link failed: {}", log));
        }

        // Shader objects no longer needed after linking
        gl.detach_shader(program, vs);
        gl.detach_shader(program, fs);
        gl.delete_shader(vs);
        gl.delete_shader(fs);

        Ok(program)
    }
}

/// Compile individual shader
fn compile_shader(gl: &glow::Context, shader_type: u32, source: &str) -> Result<glow::Shader> {
    unsafe {
        let shader = gl
            .create_shader(shader_type)
            .map_err(|e| anyhow!("Failed to create shader: {}", e))?;

        gl.shader_source(shader, source);
        gl.compile_shader(shader);

        if !gl.get_shader_compile_status(shader) {
            let log = gl.get_shader_info_log(shader);
            gl.delete_shader(shader);
            let type_name = match shader_type {
                glow::VERTEX_SHADER => "vertex",
                glow::FRAGMENT_SHADER => "fragment",
                _ => "unknown",
            };
            return Err(anyhow!("{} shader compile failed: {}", type_name, log));
        }

        Ok(shader)
    }
}
