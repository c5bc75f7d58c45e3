// src/server/page.rs
// The single HTML page. Plotly draws the scatter plot in the browser; the
// right-hand panel shows the rendered structure for the latest click.

const PLOTLY_CDN: &str = "https://cdn.plot.ly/plotly-2.35.2.min.js";

pub fn render() -> String {
  PAGE.replace("{{PLOTLY}}", PLOTLY_CDN)
}

const PAGE: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Interactive configuration explorer</title>
<script src="{{PLOTLY}}"></script>
<style>
  body { background: #111111; color: #DDDDDD; font-family: sans-serif; margin: 0; }
  h1 { text-align: center; padding: 20px; margin: 0; }
  .row { display: flex; padding: 20px; }
  #plot { width: 60%; height: 80vh; }
  #side { width: 40%; text-align: center; padding-top: 50px; }
  #point-info { min-height: 50px; }
  #caption { color: #999999; font-size: 0.9em; }
  #atom-image { max-width: 100%; max-height: 60vh; border: 1px solid #555555; border-radius: 10px; }
  #error { color: #ff6b6b; min-height: 1.2em; }
  .spinner {
    display: none; margin: 10px auto; width: 36px; height: 36px;
    border: 4px solid #444444; border-top-color: #119dff; border-radius: 50%;
    animation: spin 0.8s linear infinite;
  }
  .busy .spinner { display: block; }
  .busy #atom-image { opacity: 0.4; }
  @keyframes spin { to { transform: rotate(360deg); } }
</style>
</head>
<body>
<h1>Interactive configuration explorer</h1>
<div class="row">
  <div id="plot"></div>
  <div id="side">
    <h4 id="point-info">Loading...</h4>
    <div class="spinner"></div>
    <img id="atom-image" alt="">
    <div id="caption"></div>
    <div id="error"></div>
  </div>
</div>
<script>
  const info = document.getElementById("point-info");
  const img = document.getElementById("atom-image");
  const caption = document.getElementById("caption");
  const errorBox = document.getElementById("error");
  const side = document.getElementById("side");

  // Only the most recent click may update the panel
  let generation = 0;

  function show(result, title) {
    info.textContent = title || result.title;
    img.src = result.image;
    caption.textContent = result.caption || "";
    errorBox.textContent = "";
  }

  function busy(on) { side.classList.toggle("busy", on); }

  async function getJson(url) {
    const resp = await fetch(url);
    if (resp.status === 204) return null;
    const body = await resp.json();
    if (!resp.ok) throw new Error(body.error || resp.statusText);
    return body;
  }

  async function poll(job, title, gen) {
    while (gen === generation) {
      const result = await getJson("/api/jobs/" + job);
      if (gen !== generation) return;
      if (result.status === "done") { show(result, title); busy(false); return; }
      if (result.status === "failed") { errorBox.textContent = result.error; busy(false); return; }
      await new Promise(r => setTimeout(r, 250));
    }
  }

  async function onClick(ev) {
    if (!ev || !ev.points || ev.points.length === 0) return;
    const p = ev.points[0];
    const gen = ++generation;
    busy(true);
    try {
      const result = await getJson("/api/click?curve=" + p.curveNumber + "&point=" + p.pointNumber);
      if (gen !== generation) return;
      if (result === null) { busy(false); return; }
      if (result.status === "done") { show(result); busy(false); }
      else { info.textContent = result.title; await poll(result.job, result.title, gen); }
    } catch (e) {
      if (gen === generation) { errorBox.textContent = e.message; busy(false); }
    }
  }

  async function init() {
    const fig = await getJson("/api/figure");
    const traces = fig.traces.map(t => ({
      type: "scatter3d", mode: "markers", name: t.name,
      x: t.x, y: t.y, z: t.z, customdata: t.customdata,
      marker: { size: 3.5, symbol: "diamond", opacity: 0.8 },
      hovertemplate: "<b>Point: %{customdata}</b><extra></extra>",
    }));
    const layout = {
      title: fig.title,
      paper_bgcolor: "#111111", plot_bgcolor: "#111111", font: { color: "#DDDDDD" },
      legend: { title: { text: "Cluster" } },
      scene: { xaxis: { title: "DIM-1" }, yaxis: { title: "DIM-2" }, zaxis: { title: "DIM-3" } },
      margin: { l: 0, r: 0, b: 0, t: 40 },
    };
    const plot = document.getElementById("plot");
    await Plotly.newPlot(plot, traces, layout, { responsive: true });
    plot.on("plotly_click", onClick);

    show(await getJson("/api/initial"));
  }

  init().catch(e => { errorBox.textContent = e.message; });
</script>
</body>
</html>
"##;
