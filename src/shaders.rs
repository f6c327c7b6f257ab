//! Built-in GLSL programs the pipeline needs regardless of the demo.

/// Full-screen quad vertex stage shared by the outline composite.
pub const BASE_VERTEX_SHADER: &str = r#"
precision mediump float;

attribute vec3 aBaseVertexPosition;
varying vec2 vUv;

void main() {
    vUv = aBaseVertexPosition.xy * 0.5 + 0.5;
    gl_Position = vec4(aBaseVertexPosition, 1.0);
}
"#;

/// Edge detection over the silhouette pass, composited over the shaded pass.
pub const OUTLINE_FRAGMENT_SHADER: &str = r#"
precision mediump float;

uniform sampler2D uSource;
uniform sampler2D uOutline;
uniform vec2 uResolution;
varying vec2 vUv;

float silhouette(vec2 offset) {
    return texture2D(uOutline, vUv + offset / uResolution).r;
}

void main() {
    float center = silhouette(vec2(0.0));
    float edge = abs(silhouette(vec2(1.0, 0.0)) - center)
        + abs(silhouette(vec2(-1.0, 0.0)) - center)
        + abs(silhouette(vec2(0.0, 1.0)) - center)
        + abs(silhouette(vec2(0.0, -1.0)) - center);
    vec4 source = texture2D(uSource, vUv);
    gl_FragColor = mix(source, vec4(0.0, 0.0, 0.0, 1.0), clamp(edge, 0.0, 1.0));
}
"#;

/// Depth-only pass from the light's point of view.
pub const DEPTH_VERTEX_SHADER: &str = r#"
precision mediump float;

attribute vec3 aVertexPosition;
uniform mat4 uProjectionMatrix;
uniform mat4 uModelViewMatrix;

void main() {
    gl_Position = uProjectionMatrix * uModelViewMatrix * vec4(aVertexPosition, 1.0);
}
"#;

pub const DEPTH_FRAGMENT_SHADER: &str = r#"
precision mediump float;

void main() {
    gl_FragColor = vec4(gl_FragCoord.z, 0.0, 0.0, 1.0);
}
"#;
